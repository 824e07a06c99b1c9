use crate::session_tests::helpers::{
    TestServer, config_for, connect_live, drive_until, new_session, receive_envelope, saw,
    send_json,
};

use client_core::bridge::CommandCapture;
use client_core::protocol::FileCategory;
use client_core::protocol::types;
use client_core::session::{ConnectionState, Effect};

use std::sync::Arc;

use serde_json::json;

/// **VALUE**: Verifies a start travels to the server and the server's confirmation drives
/// the session into `Executing` with the rendered command line.
///
/// **WHY THIS MATTERS**: This is the main path of the whole client: form values become a
/// start frame, and only the server's broadcast makes the job visible as running.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The frequency is sent as a string or a float instead of an integer
/// - The start frame is not framed as `rpitx.execution.start`
/// - The started broadcast is not routed to the execution machine
#[tokio::test]
async fn given_live_session_when_tune_started_then_server_confirms_and_status_shows_command() {
    // GIVEN: A session live on a test server
    let mut server = TestServer::start().await;
    let (mut session, mut events) = new_session(
        config_for(&server.base_url),
        Arc::new(CommandCapture::new("arecord")),
    );
    let mut socket = connect_live(&mut session, &mut events, &mut server).await;
    assert_eq!(session.context().connection, ConnectionState::Live);

    // WHEN: Starting tune at 144.5 MHz
    session.select_module("tune").expect("tune exists");
    session
        .form_mut()
        .expect("tune form")
        .set("frequency", "144500000");
    session.start().expect("start is sent");

    // THEN: The server receives an integer frequency
    let envelope = receive_envelope(&mut socket).await;
    assert_eq!(envelope.event_type, types::EXECUTION_START);
    assert_eq!(envelope.data["moduleName"], json!("tune"));
    assert_eq!(envelope.data["args"]["frequency"], json!(144500000));
    assert!(envelope.id.is_some(), "Commands carry a correlation id");

    // WHEN: The server broadcasts the start
    send_json(
        &mut socket,
        json!({
            "type": types::EXECUTION_STARTED,
            "data": {"moduleName": "tune", "args": {"frequency": 144500000}}
        }),
    )
    .await;

    // THEN: The status shows the command line
    drive_until(&mut session, &mut events, |s| {
        saw(s, |effect| {
            matches!(effect, Effect::Status(text) if text.contains("tune -frequency 144500000"))
        })
    })
    .await;
    assert!(session.execution().is_executing());

    // WHEN: Stopping, and the server confirms
    session.stop(false).expect("stop is sent");
    let envelope = receive_envelope(&mut socket).await;
    assert_eq!(envelope.event_type, types::EXECUTION_STOP);
    send_json(&mut socket, json!({"type": types::EXECUTION_STOPPED, "data": {}})).await;

    // THEN: Back to idle
    drive_until(&mut session, &mut events, |s| !s.execution().is_executing()).await;
}

/// **VALUE**: Verifies a delete error for a data file reports an error and reloads only
/// the data listing, leaving the editor open.
///
/// **WHY THIS MATTERS**: Three browsers share one control channel; a reply must reach only
/// the browser whose file it names.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The reply is fanned out to the audio or image browser
/// - The editor is closed on failure, losing the operator's context
/// - The pending request is not cleared
#[tokio::test]
async fn given_data_file_when_delete_rejected_then_only_data_browser_reacts() {
    // GIVEN: A live session editing a data upload
    let mut server = TestServer::start().await;
    let (mut session, mut events) = new_session(
        config_for(&server.base_url),
        Arc::new(CommandCapture::new("arecord")),
    );
    let mut socket = connect_live(&mut session, &mut events, &mut server).await;
    let path = "./files/data/uploads/x.bin";
    session.select_file(FileCategory::Data, path);
    session.open_editor(FileCategory::Data).expect("editable");

    // WHEN: Deleting, and the server refuses
    session.delete(FileCategory::Data).expect("delete is sent");
    let envelope = receive_envelope(&mut socket).await;
    assert_eq!(envelope.event_type, types::FILE_DELETE);
    assert_eq!(envelope.data["filePath"], json!(path));
    send_json(
        &mut socket,
        json!({
            "type": types::FILE_DELETE_ERROR,
            "data": {"fileName": path, "error": "EACCES", "message": "Permission denied"}
        }),
    )
    .await;

    drive_until(&mut session, &mut events, |s| {
        saw(s, |effect| {
            matches!(effect, Effect::Error(text) if text.starts_with("Failed to delete file"))
        })
    })
    .await;

    // THEN: Only the data listing reloads; editor and selection survive
    let reloads: Vec<FileCategory> = session
        .sink()
        .iter()
        .filter_map(|effect| match effect {
            Effect::ReloadListing { category, .. } => Some(*category),
            _ => None,
        })
        .collect();
    assert_eq!(reloads, vec![FileCategory::Data]);
    assert!(session.files().editing(FileCategory::Data).is_some());
    assert!(session.files().pending().is_empty());
    assert_eq!(
        session.context().selections.get(FileCategory::Data),
        Some(path)
    );
}

/// **VALUE**: Verifies a dropped control connection is reported and then re-established.
///
/// **WHY THIS MATTERS**: The transmitter host restarts its server; the client must
/// come back on its own without operator action.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - A disconnect is reported with the connect-failed notice
/// - The channel gives up after the first drop
/// - The notice is not cleared after reconnecting
#[tokio::test]
async fn given_live_session_when_server_drops_then_notice_and_reconnect() {
    // GIVEN: A live session
    let mut server = TestServer::start().await;
    let (mut session, mut events) = new_session(
        config_for(&server.base_url),
        Arc::new(CommandCapture::new("arecord")),
    );
    let socket = connect_live(&mut session, &mut events, &mut server).await;

    // WHEN: The server drops the connection
    drop(socket);

    // THEN: Disconnected with the reconnecting notice
    drive_until(&mut session, &mut events, |s| {
        s.context().connection == ConnectionState::Disconnected
    })
    .await;
    assert!(saw(&session, |effect| {
        *effect == Effect::Notice("WebSocket disconnected - reconnecting...".to_string())
    }));
    session.select_module("tune").expect("tune exists");
    assert!(session.start().is_err(), "Nothing can be sent while down");
    assert!(!session.execution().is_executing());

    // THEN: It reconnects by itself and clears the notice
    let _socket = server.accept("/ws").await;
    drive_until(&mut session, &mut events, |s| {
        s.context().connection == ConnectionState::Live
    })
    .await;
    assert_eq!(session.sink().last(), Some(&Effect::system("Connected to server")));

    session.shutdown();
}
