use crate::session_tests::helpers::new_session;

use client_core::bridge::CommandCapture;
use client_core::config::ClientConfig;
use client_core::protocol::FileCategory;
use client_core::snapshot::SnapshotStore;

use std::sync::Arc;

/// **VALUE**: Verifies the config and the session snapshot both survive a restart on disk.
///
/// **WHY THIS MATTERS**: Operators tune forms once and expect them back after closing the
/// client, including which module was selected.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The snapshot directory from the config is ignored
/// - Forms or selections are lost between save and restore
/// - The config round trip drops the snapshot section
#[tokio::test]
async fn given_saved_state_when_new_session_restores_then_forms_and_module_return() {
    // GIVEN: A config that stores snapshots in a temp dir
    let config_dir = tempfile::tempdir().expect("config dir");
    let state_dir = tempfile::tempdir().expect("state dir");
    let mut config = ClientConfig::default();
    config.snapshot.dir = Some(state_dir.path().to_path_buf());
    config.save(config_dir.path()).expect("config saves");

    // GIVEN: A session edited and snapshotted on exit
    let config = ClientConfig::load(config_dir.path()).expect("config loads");
    let store = SnapshotStore::new(&config.snapshot_dir());
    {
        let (mut session, _events) =
            new_session(config.clone(), Arc::new(CommandCapture::new("arecord")));
        session.select_module("morse").expect("morse exists");
        session
            .form_mut()
            .expect("morse form")
            .set("message", "CQ CQ");
        session.select_file(FileCategory::Image, "./files/images/uploads/cat.png");
        store.save(&session.snapshot()).expect("snapshot saves");
    }

    // WHEN: A new session restores it
    let (mut session, _events) = new_session(config, Arc::new(CommandCapture::new("arecord")));
    session.restore(store.load());

    // THEN: Module, form and selection are back
    assert_eq!(session.context().module, "morse");
    assert_eq!(session.form_mut().expect("morse form").get("message"), "CQ CQ");
    assert_eq!(
        session.context().selections.get(FileCategory::Image),
        Some("./files/images/uploads/cat.png")
    );
    assert!(store.path().starts_with(state_dir.path()));
}
