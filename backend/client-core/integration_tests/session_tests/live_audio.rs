use crate::session_tests::helpers::{
    FakeCapture, TestServer, config_for, connect_live, drive_until, new_session, receive_binary,
    receive_envelope, send_json,
};

use client_core::bridge::BridgePhase;
use client_core::bridge::pcm::encode_block;
use client_core::error::{CoreError, ValidationError};
use client_core::modules::{LIVE_AUDIO_MODULE, SOCKET_PATH_ARG};
use client_core::protocol::types;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::StreamExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

const WRITER_SOCKET: &str = "/tmp/piraterf-audiosock.sock";

/// **VALUE**: Verifies the full live audio path: bridge handshake, microphone, launch with
/// the socket path, PCM streaming, and teardown when the job stops.
///
/// **WHY THIS MATTERS**: The remote job can only read audio once the bridge endpoint exists
/// and the microphone is open. Launching early points the transmitter at nothing; never
/// tearing down leaves the microphone held.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The start frame is sent before the endpoint is known
/// - `socketPath` is missing from the launched job's args
/// - Samples are streamed as f32 instead of 16-bit little-endian PCM
/// - The microphone or the bridge connection survive the stop
#[tokio::test]
async fn given_live_module_when_bridge_ready_then_launches_streams_and_tears_down() {
    // GIVEN: A live session with a fake microphone
    let mut server = TestServer::start().await;
    let block = vec![0.5, -0.5, 0.0, 1.0];
    let capture = Arc::new(FakeCapture::new(block.clone()));
    let microphone = capture.active.clone();
    let (mut session, mut events) = new_session(config_for(&server.base_url), capture);
    let mut control = connect_live(&mut session, &mut events, &mut server).await;

    // WHEN: Starting the live audio module
    session
        .select_module(LIVE_AUDIO_MODULE)
        .expect("live module exists");
    session.start().expect("bridge starts");
    assert_eq!(session.bridge().phase(), BridgePhase::BridgeConnecting);
    assert!(!session.execution().is_executing(), "Not launched yet");

    // WHEN: The bridge connects and announces its endpoint
    let mut bridge = server.accept("/wsunix").await;
    send_json(
        &mut bridge,
        json!({"type": types::BRIDGE_INIT, "data": {"writerSocket": WRITER_SOCKET}}),
    )
    .await;

    // THEN: Once the microphone is ready the job launches and streams
    drive_until(&mut session, &mut events, |s| {
        s.bridge().phase() == BridgePhase::Streaming
    })
    .await;
    assert!(microphone.load(Ordering::SeqCst));

    let start = receive_envelope(&mut control).await;
    assert_eq!(start.event_type, types::EXECUTION_START);
    assert_eq!(start.data["moduleName"], json!(LIVE_AUDIO_MODULE));
    assert_eq!(start.data["args"][SOCKET_PATH_ARG], json!(WRITER_SOCKET));

    let pcm = receive_binary(&mut bridge).await;
    assert_eq!(pcm, encode_block(&block));
    assert_eq!(pcm.len(), block.len() * 2);

    // WHEN: The server reports the job stopped
    send_json(&mut control, json!({"type": types::EXECUTION_STOPPED, "data": {}})).await;
    drive_until(&mut session, &mut events, |s| {
        s.bridge().phase() == BridgePhase::Closed
    })
    .await;

    // THEN: Microphone released and the bridge closed from our side
    assert!(!microphone.load(Ordering::SeqCst));
    let closed = tokio::time::timeout(crate::session_tests::helpers::TEST_TIMEOUT, async {
        loop {
            match bridge.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("Bridge not closed in time");
    assert!(closed);
}

/// **VALUE**: Verifies the live module refuses to start while the control channel is down.
///
/// **WHY THIS MATTERS**: Opening the microphone for a job that can never be launched
/// would hold the device for nothing.
///
/// **BUG THIS CATCHES**: Would catch the bridge being opened before the liveness check.
#[tokio::test]
async fn given_offline_session_when_live_module_started_then_bridge_stays_closed() {
    // GIVEN: A session that never connected
    let server = TestServer::start().await;
    let capture = Arc::new(FakeCapture::new(vec![0.0]));
    let microphone = capture.active.clone();
    let (mut session, _events) = new_session(config_for(&server.base_url), capture);

    // WHEN: Starting the live module
    session
        .select_module(LIVE_AUDIO_MODULE)
        .expect("live module exists");
    let result = session.start();

    // THEN: Refused, nothing opened
    assert!(result.is_err());
    assert_eq!(session.bridge().phase(), BridgePhase::Closed);
    assert!(!microphone.load(Ordering::SeqCst));
}

/// **VALUE**: Verifies a second start is refused while a live launch is still pending.
///
/// **WHY THIS MATTERS**: The execution machine stays idle until the bridge is ready, so
/// without this guard another module could be started in the gap and the live job
/// would later fail to launch and tear itself down.
///
/// **BUG THIS CATCHES**: Would catch `start` only consulting the execution machine and
/// sending a second `rpitx.execution.start` while the bridge is connecting.
#[tokio::test]
async fn given_pending_live_launch_when_other_module_started_then_rejected_and_live_launches() {
    // GIVEN: A live start waiting for the bridge
    let mut server = TestServer::start().await;
    let capture = Arc::new(FakeCapture::new(vec![0.25]));
    let (mut session, mut events) = new_session(config_for(&server.base_url), capture);
    let mut control = connect_live(&mut session, &mut events, &mut server).await;
    session
        .select_module(LIVE_AUDIO_MODULE)
        .expect("live module exists");
    session.start().expect("bridge starts");
    assert_eq!(session.bridge().phase(), BridgePhase::BridgeConnecting);

    // WHEN: Another module is started before the launch
    session.select_module("tune").expect("tune exists");
    let second = session.start();

    // THEN: Refused, nothing executing, bridge untouched
    assert!(matches!(
        second,
        Err(CoreError::Validation(ValidationError::AlreadyExecuting { .. }))
    ));
    assert!(!session.execution().is_executing());
    assert_eq!(session.bridge().phase(), BridgePhase::BridgeConnecting);

    // WHEN: The bridge completes its handshake
    let mut bridge = server.accept("/wsunix").await;
    send_json(
        &mut bridge,
        json!({"type": types::BRIDGE_INIT, "data": {"writerSocket": WRITER_SOCKET}}),
    )
    .await;
    drive_until(&mut session, &mut events, |s| {
        s.bridge().phase() == BridgePhase::Streaming
    })
    .await;

    // THEN: The first start on the wire is the live job
    let start = receive_envelope(&mut control).await;
    assert_eq!(start.event_type, types::EXECUTION_START);
    assert_eq!(start.data["moduleName"], json!(LIVE_AUDIO_MODULE));
}

/// **VALUE**: Verifies the server closing the bridge mid-stream tears the session down.
///
/// **WHY THIS MATTERS**: Nothing can reach the transmitter once the bridge is gone; the
/// microphone must not stay open behind a dead connection.
///
/// **BUG THIS CATCHES**: Would catch an unprompted close leaving the phase at `Streaming`
/// or the microphone held.
#[tokio::test]
async fn given_streaming_when_server_closes_bridge_then_closed_and_microphone_released() {
    // GIVEN: A streaming live session
    let mut server = TestServer::start().await;
    let block = vec![0.5, -0.25];
    let capture = Arc::new(FakeCapture::new(block.clone()));
    let microphone = capture.active.clone();
    let (mut session, mut events) = new_session(config_for(&server.base_url), capture);
    let _control = connect_live(&mut session, &mut events, &mut server).await;
    session
        .select_module(LIVE_AUDIO_MODULE)
        .expect("live module exists");
    session.start().expect("bridge starts");

    let mut bridge = server.accept("/wsunix").await;
    send_json(
        &mut bridge,
        json!({"type": types::BRIDGE_INIT, "data": {"writerSocket": WRITER_SOCKET}}),
    )
    .await;
    drive_until(&mut session, &mut events, |s| {
        s.bridge().phase() == BridgePhase::Streaming
    })
    .await;
    assert_eq!(receive_binary(&mut bridge).await, encode_block(&block));
    assert!(microphone.load(Ordering::SeqCst));

    // WHEN: The server closes the bridge on its own
    bridge.close(None).await.expect("Failed to close bridge");

    // THEN: Torn down in order, microphone released
    drive_until(&mut session, &mut events, |s| {
        s.bridge().phase() == BridgePhase::Closed
    })
    .await;
    assert!(!microphone.load(Ordering::SeqCst));
    assert!(!session.bridge().has_live_device());
    assert!(!session.bridge().gate().has_state());
}
