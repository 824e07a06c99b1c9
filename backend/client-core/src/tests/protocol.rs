// Unit tests for the protocol module
// Envelope decoding, category classification and command framing

use crate::protocol::category::{file_name, parent_dir};
use crate::protocol::{
    BridgeInit, Command, Envelope, FileCategory, FileOpKind, InboundEvent, JobDescriptor, types,
};

use serde_json::{Map, json};

/// **VALUE**: Verifies every upload directory segment classifies to its own category.
///
/// **WHY THIS MATTERS**: File replies are routed to a browser by this one decision.
/// A wrong answer refreshes and mutates the wrong listing.
///
/// **BUG THIS CATCHES**: Would catch a reordering of the segment checks that lets
/// the audio fallback win over image or data paths.
#[test]
fn given_paths_in_each_upload_dir_when_classify_then_returns_matching_category() {
    assert_eq!(
        FileCategory::classify("./files/images/uploads/cat.png"),
        FileCategory::Image
    );
    assert_eq!(
        FileCategory::classify("./files/data/uploads/x.bin"),
        FileCategory::Data
    );
    assert_eq!(
        FileCategory::classify("./files/audio/uploads/song.wav"),
        FileCategory::Audio
    );
    assert_eq!(
        FileCategory::classify("./files/audio/sfx/boom.wav"),
        FileCategory::Audio
    );
    assert_eq!(FileCategory::classify("mystery.bin"), FileCategory::Audio);
}

/// **VALUE**: Verifies only direct children of a category's upload dir count as editable.
///
/// **WHY THIS MATTERS**: SFX and nested files are read-only on the server; offering
/// rename/delete for them only produces server errors.
///
/// **BUG THIS CATCHES**: Would catch a prefix check that forgets the trailing slash
/// or accepts nested paths.
#[test]
fn given_paths_when_is_upload_path_then_accepts_only_direct_children() {
    let root = "./files";
    assert!(FileCategory::Audio.is_upload_path("./files/audio/uploads/a.wav", root));
    assert!(!FileCategory::Audio.is_upload_path("./files/audio/sfx/a.wav", root));
    assert!(!FileCategory::Audio.is_upload_path("./files/audio/uploads/", root));
    assert!(!FileCategory::Audio.is_upload_path("./files/audio/uploads/x/a.wav", root));
    assert!(!FileCategory::Image.is_upload_path("./files/audio/uploads/a.wav", root));
    assert!(FileCategory::Data.is_upload_path("./files/data/uploads/x.bin", "./files/"));
}

/// **VALUE**: Verifies path helpers split at the last slash.
///
/// **WHY THIS MATTERS**: The renamed file's new path is built from the parent dir
/// of the old path plus the new name.
///
/// **BUG THIS CATCHES**: Would catch off-by-one slicing that keeps or drops the slash.
#[test]
fn given_server_path_when_split_then_returns_parent_and_name() {
    let path = "./files/audio/uploads/song.wav";
    assert_eq!(file_name(path), "song.wav");
    assert_eq!(parent_dir(path), "./files/audio/uploads");
    assert_eq!(file_name("plain"), "plain");
    assert_eq!(parent_dir("plain"), "");
}

/// **VALUE**: Verifies upload module tags map to the directory the server files them in.
///
/// **WHY THIS MATTERS**: After an upload the matching listing is reloaded; the wrong
/// category means the new file never shows up.
///
/// **BUG THIS CATCHES**: Would catch a module missing from the data or image arms.
#[test]
fn given_upload_module_when_for_upload_module_then_returns_server_category() {
    assert_eq!(FileCategory::for_upload_module("fsk"), FileCategory::Data);
    assert_eq!(FileCategory::for_upload_module("sendiq"), FileCategory::Data);
    assert_eq!(
        FileCategory::for_upload_module("spectrumpaint"),
        FileCategory::Image
    );
    assert_eq!(FileCategory::for_upload_module("pisstv"), FileCategory::Image);
    assert_eq!(FileCategory::for_upload_module("pifmrds"), FileCategory::Audio);
}

/// **VALUE**: Verifies every outbound command gets a fresh, distinct correlation id.
///
/// **WHY THIS MATTERS**: Replies are correlated with the id recorded at send time.
///
/// **BUG THIS CATCHES**: Would catch a cached or missing id.
#[test]
fn given_two_commands_when_into_envelope_then_ids_are_present_and_distinct() {
    // GIVEN: Two identical stop commands
    // WHEN: Framing both
    let first = Command::StopExecution.into_envelope().unwrap();
    let second = Command::StopExecution.into_envelope().unwrap();

    // THEN: Both carry ids, and they differ
    assert_eq!(first.event_type, types::EXECUTION_STOP);
    let first_id = first.id.expect("first id");
    let second_id = second.id.expect("second id");
    assert_ne!(first_id, second_id);
    assert!(uuid::Uuid::parse_str(&first_id).is_ok());
}

/// **VALUE**: Verifies the start payload uses the server's camelCase field names.
///
/// **WHY THIS MATTERS**: The server rejects `module_name`; it only reads `moduleName`.
///
/// **BUG THIS CATCHES**: Would catch a lost `rename_all` on the job descriptor.
#[test]
fn given_job_descriptor_when_framed_then_payload_is_camel_case() {
    // GIVEN: A tune job
    let mut args = Map::new();
    args.insert("frequency".to_string(), json!(144500000));
    let mut job = JobDescriptor::new("tune", args);
    job.play_once = true;

    // WHEN: Framing the start command
    let envelope = Command::StartExecution(job).into_envelope().unwrap();

    // THEN: Payload fields are camelCase
    assert_eq!(envelope.event_type, types::EXECUTION_START);
    assert_eq!(envelope.data["moduleName"], "tune");
    assert_eq!(envelope.data["args"]["frequency"], 144500000);
    assert_eq!(envelope.data["playOnce"], true);
    assert_eq!(envelope.data["timeout"], 0);
}

/// **VALUE**: Verifies a delete error decodes to a data-tagged file reply.
///
/// **WHY THIS MATTERS**: This is the tag every downstream file handler branches on.
///
/// **BUG THIS CATCHES**: Would catch classification of the wrong field or success/error swaps.
#[test]
fn given_file_delete_error_for_data_path_when_decoded_then_tagged_data_with_rejection() {
    // GIVEN: A delete error envelope
    let envelope = Envelope::parse(
        r#"{"type":"file.delete.error","data":{"fileName":"./files/data/uploads/x.bin","error":"DELETE_FAILED","message":"busy"}}"#,
    )
    .unwrap();

    // WHEN: Decoding it
    let event = InboundEvent::from_envelope(&envelope).unwrap();

    // THEN: It is a data delete reply carrying the rejection
    let Some(InboundEvent::File(reply)) = event else {
        panic!("expected file reply, got {event:?}");
    };
    assert_eq!(reply.kind, FileOpKind::Delete);
    assert_eq!(reply.category, FileCategory::Data);
    let rejection = reply.outcome.unwrap_err();
    assert_eq!(rejection.error, "DELETE_FAILED");
    assert_eq!(rejection.describe(), "busy");
}

/// **VALUE**: Verifies unknown types decode to nothing rather than an error.
///
/// **WHY THIS MATTERS**: The server broadcasts events this client does not use;
/// they must not break the read loop.
///
/// **BUG THIS CATCHES**: Would catch a catch-all arm that returns an error.
#[test]
fn given_unknown_type_when_decoded_then_returns_none() {
    let envelope = Envelope::new("system.heartbeat", json!({"uptime": 3}));
    assert!(InboundEvent::from_envelope(&envelope).unwrap().is_none());
}

/// **VALUE**: Verifies a stop event with no data still decodes.
///
/// **WHY THIS MATTERS**: Stopped events sometimes arrive with `data` missing or null.
///
/// **BUG THIS CATCHES**: Would catch deserializing `null` straight into a struct.
#[test]
fn given_stopped_without_data_when_decoded_then_returns_stopped_event() {
    let envelope = Envelope::parse(r#"{"type":"rpitx.execution.stopped"}"#).unwrap();
    let event = InboundEvent::from_envelope(&envelope).unwrap();
    assert!(matches!(event, Some(InboundEvent::ExecutionStopped(_))));
}

/// **VALUE**: Verifies the bridge init payload exposes the writer socket.
///
/// **WHY THIS MATTERS**: The live audio job is launched with this path as `socketPath`.
///
/// **BUG THIS CATCHES**: Would catch a wrong camelCase mapping for `writerSocket`.
#[test]
fn given_bridge_init_when_parsed_then_returns_writer_socket() {
    let envelope = Envelope::parse(
        r#"{"type":"wsunixbridge.init","data":{"writerSocket":"/tmp/w.sock","readerSocket":"/tmp/r.sock"}}"#,
    )
    .unwrap();

    let init = BridgeInit::from_envelope(&envelope).unwrap().expect("init");
    assert_eq!(init.writer_socket, "/tmp/w.sock");
    assert_eq!(init.reader_socket.as_deref(), Some("/tmp/r.sock"));

    let other = Envelope::new(types::EXECUTION_STARTED, json!({}));
    assert!(BridgeInit::from_envelope(&other).unwrap().is_none());
}
