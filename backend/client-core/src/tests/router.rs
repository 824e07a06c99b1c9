// Unit tests for router dispatch and debug mirroring

use crate::protocol::{
    Command, ExecutionStarted, ExecutionStopped, FileCategory, FileReply, OutputLine,
    PlaylistCreated, PlaylistFailed, Rejection,
};
use crate::router::{EventHandler, Router};

/// Records which handler methods were called.
#[derive(Default)]
struct RecordingHandler {
    calls: Vec<String>,
    replies: Vec<FileReply>,
}

impl EventHandler for RecordingHandler {
    fn execution_started(&mut self, _event: ExecutionStarted) {
        self.calls.push("started".to_string());
    }

    fn execution_stopped(&mut self, _event: ExecutionStopped) {
        self.calls.push("stopped".to_string());
    }

    fn execution_error(&mut self, _rejection: Rejection) {
        self.calls.push("error".to_string());
    }

    fn output_line(&mut self, line: OutputLine) {
        self.calls.push(format!("output:{}", line.render()));
    }

    fn file_reply(&mut self, reply: FileReply) {
        self.calls.push(format!("file:{}", reply.category));
        self.replies.push(reply);
    }

    fn playlist_created(&mut self, _event: PlaylistCreated) {
        self.calls.push("playlist-created".to_string());
    }

    fn playlist_failed(&mut self, _event: PlaylistFailed) {
        self.calls.push("playlist-failed".to_string());
    }
}

fn route(router: &Router, text: &str, handler: &mut RecordingHandler) {
    let routed = router.decode(text).expect("decodes");
    if let Some(event) = routed.event {
        Router::dispatch(event, handler);
    }
}

/// **VALUE**: Verifies a delete success under the image uploads dir reaches only the image handler.
///
/// **WHY THIS MATTERS**: Each browser reloads and clears its own selection on a reply;
/// a reply delivered to two categories corrupts the other browser's state.
///
/// **BUG THIS CATCHES**: Would catch fan-out dispatch or a classification fallback
/// winning over the image segment.
#[test]
fn given_image_delete_success_when_dispatched_then_only_image_handler_invoked() {
    // GIVEN: A router and a recording handler
    let router = Router::new(false);
    let mut handler = RecordingHandler::default();

    // WHEN: A delete success for an image path arrives
    route(
        &router,
        r#"{"type":"file.delete.success","data":{"fileName":"./files/images/uploads/cat.png"}}"#,
        &mut handler,
    );

    // THEN: Exactly one call, tagged image
    assert_eq!(handler.calls, vec!["file:image".to_string()]);
    assert_eq!(handler.replies[0].category, FileCategory::Image);
    assert!(handler.replies[0].outcome.is_ok());
}

/// **VALUE**: Verifies each upload segment is dispatched to its own category, symmetrically.
///
/// **WHY THIS MATTERS**: The image case alone does not prove audio and data are routed right.
///
/// **BUG THIS CATCHES**: Would catch a data path being classified as audio.
#[test]
fn given_replies_for_each_segment_when_dispatched_then_each_hits_own_category() {
    let router = Router::new(false);
    let mut handler = RecordingHandler::default();

    route(
        &router,
        r#"{"type":"file.rename.success","data":{"fileName":"./files/audio/uploads/a.wav","newName":"b.wav"}}"#,
        &mut handler,
    );
    route(
        &router,
        r#"{"type":"file.delete.error","data":{"fileName":"./files/data/uploads/x.bin","error":"E","message":"m"}}"#,
        &mut handler,
    );

    assert_eq!(
        handler.calls,
        vec!["file:audio".to_string(), "file:data".to_string()]
    );
}

/// **VALUE**: Verifies unknown message types are ignored without calling any handler.
///
/// **WHY THIS MATTERS**: The server broadcasts messages aimed at other clients.
///
/// **BUG THIS CATCHES**: Would catch a default arm that dispatches somewhere.
#[test]
fn given_unknown_type_when_routed_then_no_handler_invoked() {
    let router = Router::new(false);
    let mut handler = RecordingHandler::default();

    route(&router, r#"{"type":"client.joined","data":{}}"#, &mut handler);

    assert!(handler.calls.is_empty());
}

/// **VALUE**: Verifies output lines are dispatched with their stream tag.
///
/// **WHY THIS MATTERS**: Output is the operator's only view of the remote process.
///
/// **BUG THIS CATCHES**: Would catch the `type` field not mapping to the stream name.
#[test]
fn given_output_line_when_routed_then_rendered_with_stream_tag() {
    let router = Router::new(false);
    let mut handler = RecordingHandler::default();

    route(
        &router,
        r#"{"type":"rpitx.execution.output-line","data":{"type":"stderr","line":"boom"}}"#,
        &mut handler,
    );

    assert_eq!(handler.calls, vec!["output:[STDERR] boom".to_string()]);
}

/// **VALUE**: Verifies debug mode mirrors both directions and non-debug mode mirrors nothing.
///
/// **WHY THIS MATTERS**: The mirror is the developer log; with debug off it must stay quiet.
///
/// **BUG THIS CATCHES**: Would catch the debug flag being ignored in either direction.
#[test]
fn given_debug_flag_when_framing_and_decoding_then_mirror_follows_flag() {
    // GIVEN: A quiet router and a debug router
    let quiet = Router::new(false);
    let mut loud = Router::default();
    loud.set_debug(true);

    // WHEN: Framing and decoding
    let quiet_frame = quiet.frame(Command::StopExecution).unwrap();
    let loud_frame = loud.frame(Command::StopExecution).unwrap();
    let loud_routed = loud.decode(r#"{"type":"rpitx.execution.stopped"}"#).unwrap();

    // THEN: Only the debug router produces mirror text, labelled by direction
    assert!(quiet_frame.mirror.is_none());
    assert!(loud_frame.mirror.unwrap().starts_with("SENDING: "));
    assert!(loud_routed.mirror.unwrap().starts_with("RECEIVED: "));
    assert!(loud_frame.text.contains("rpitx.execution.stop"));
}

/// **VALUE**: Verifies malformed text is a decode error, not a panic.
///
/// **WHY THIS MATTERS**: A bad frame from the server must not take down the session.
///
/// **BUG THIS CATCHES**: Would catch an unwrap in the decode path.
#[test]
fn given_malformed_json_when_decoded_then_returns_error() {
    let router = Router::new(true);
    assert!(router.decode("{not json").is_err());
}
