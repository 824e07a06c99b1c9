// Unit tests for session snapshots: capture/apply, field-by-field fallback, store

use crate::modules;
use crate::protocol::FileCategory;
use crate::session::SessionContext;
use crate::snapshot::{SNAPSHOT_KEY, Snapshot, SnapshotStore};

use serde_json::json;

fn pifmrds() -> &'static modules::ModuleSpec {
    modules::find("pifmrds").expect("pifmrds")
}

fn edited_context() -> SessionContext {
    let mut context = SessionContext::default();
    context.module = "tune".to_string();
    context
        .selections
        .set(FileCategory::Audio, "./files/audio/uploads/a.wav");
    let form = context.forms.form_mut(pifmrds());
    form.set("ps", "PIRATE");
    form.play_once = true;
    form.intro_outro = true;
    form.intro = "./files/audio/sfx/intro.wav".to_string();
    form.timeout = "45".to_string();
    let tune = modules::find("tune").expect("tune");
    context.forms.form_mut(tune).set_flag("exitImmediate", true);
    context
}

/// **VALUE**: Verifies a captured snapshot restores the same module, forms and selections.
///
/// **WHY THIS MATTERS**: The snapshot is a pure function of the context; restoring it must
/// give back what the operator left.
///
/// **BUG THIS CATCHES**: Would catch playback options or flags lost through JSON.
#[test]
fn given_edited_context_when_snapshot_round_trips_then_state_restored() {
    // GIVEN: An edited context
    let context = edited_context();

    // WHEN: Capturing, serializing and restoring into a fresh context
    let json = Snapshot::capture(&context).to_json().unwrap();
    let mut restored = SessionContext::default();
    Snapshot::from_json(&json).apply(&mut restored);

    // THEN: Module, forms and selections match
    assert_eq!(restored.module, "tune");
    assert_eq!(restored.forms, context.forms);
    assert_eq!(
        restored.selections.get(FileCategory::Audio),
        Some("./files/audio/uploads/a.wav")
    );
    assert!(json.contains(SNAPSHOT_KEY));
}

/// **VALUE**: Verifies malformed fields fall back individually while good fields are kept.
///
/// **WHY THIS MATTERS**: One corrupted value must not wipe every saved setting.
///
/// **BUG THIS CATCHES**: Would catch all-or-nothing deserialization of the snapshot.
#[test]
fn given_partially_malformed_snapshot_when_loaded_then_field_by_field_fallback() {
    // GIVEN: A snapshot with one good field among several bad ones
    let value = json!({
        "modulename": "no-such-module",
        "pifmrds": {
            "ps": "KEEP",
            "freq": {"nested": true},
            "playOnce": "yes",
            "timeout": 60,
            "unknownField": "dropped"
        },
        "tune": "not an object",
        "selections": {"image": "./files/images/uploads/cat.png", "data": 5}
    });

    // WHEN: Rebuilding
    let snapshot = Snapshot::from_value(&value);

    // THEN: Good fields kept, bad fields at their defaults
    assert_eq!(snapshot.module, modules::DEFAULT_MODULE);
    let form = snapshot.forms.form(pifmrds());
    assert_eq!(form.get("ps"), "KEEP");
    assert_eq!(form.get("freq"), "431");
    assert!(!form.play_once);
    assert_eq!(form.timeout, "60");
    assert_eq!(form.get("unknownField"), "");
    assert_eq!(
        snapshot.selections.get(FileCategory::Image),
        Some("./files/images/uploads/cat.png")
    );
    assert_eq!(snapshot.selections.get(FileCategory::Data), None);
}

/// **VALUE**: Verifies blank saved values keep the field's default.
///
/// **WHY THIS MATTERS**: A cleared frequency field would otherwise make every start fail.
///
/// **BUG THIS CATCHES**: Would catch empty strings overwriting defaults.
#[test]
fn given_blank_saved_value_when_loaded_then_default_kept() {
    let value = json!({"pifmrds": {"freq": ""}});
    let snapshot = Snapshot::from_value(&value);
    assert_eq!(snapshot.forms.form(pifmrds()).get("freq"), "431");
}

/// **VALUE**: Verifies garbage JSON and a missing key both yield defaults.
///
/// **WHY THIS MATTERS**: Loading never fails; it degrades.
///
/// **BUG THIS CATCHES**: Would catch a panic on non-JSON input.
#[test]
fn given_garbage_when_from_json_then_defaults() {
    assert_eq!(Snapshot::from_json("not json"), Snapshot::default());
    assert_eq!(Snapshot::from_json(r#"{"other": {}}"#), Snapshot::default());
}

/// **VALUE**: Verifies the store saves atomically and loads back, defaulting when absent.
///
/// **WHY THIS MATTERS**: The snapshot file is written on every exit.
///
/// **BUG THIS CATCHES**: Would catch the temp file being left behind or a missing dir erroring.
#[test]
fn given_store_when_saved_and_loaded_then_round_trips() {
    // GIVEN: A store in a directory that does not exist yet
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(&dir.path().join("state"));
    assert_eq!(store.load(), Snapshot::default());

    // WHEN: Saving an edited snapshot
    let snapshot = Snapshot::capture(&edited_context());
    store.save(&snapshot).unwrap();

    // THEN: It loads back and no temp file remains
    assert_eq!(store.load(), snapshot);
    assert!(store.path().exists());
    assert!(!store.path().with_extension("json.tmp").exists());

    std::fs::write(store.path(), "{{{").unwrap();
    assert_eq!(store.load(), Snapshot::default());
}
