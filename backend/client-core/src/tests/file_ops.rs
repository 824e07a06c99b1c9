// Unit tests for the file mutation protocol

use crate::error::CoreError;
use crate::error::file_ops::FileOpError;
use crate::file_ops::{FileMutationProtocol, RenameRequest, Selections};
use crate::protocol::{FileCategory, FileOpKind, FileReply, Rejection};
use crate::router::Router;
use crate::session::effect::Effect;

const ROOT: &str = "./files";
const SONG: &str = "./files/audio/uploads/song.wav";
const BLOB: &str = "./files/data/uploads/x.bin";

fn editing(category: FileCategory, path: &str) -> (FileMutationProtocol, Selections) {
    let mut files = FileMutationProtocol::new(ROOT);
    let mut selections = Selections::default();
    selections.set(category, path);
    files.open_editor(category, &selections).unwrap();
    (files, selections)
}

fn reloads(effects: &[Effect]) -> Vec<(FileCategory, Option<String>)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::ReloadListing { category, select } => Some((*category, select.clone())),
            _ => None,
        })
        .collect()
}

/// **VALUE**: Verifies rename + success leaves the selection on the renamed file.
///
/// **WHY THIS MATTERS**: The operator expects to keep working with the file they just renamed.
///
/// **BUG THIS CATCHES**: Would catch the reload pre-selecting the old (now missing) name.
#[test]
fn given_rename_sent_when_success_arrives_then_selection_is_new_name() {
    // GIVEN: An audio file open for editing and a rename in flight
    let router = Router::new(false);
    let (mut files, mut selections) = editing(FileCategory::Audio, SONG);
    let request = files
        .rename(&router, FileCategory::Audio, "tune.wav", true)
        .unwrap();
    assert!(matches!(request, RenameRequest::Send(_)));
    assert_eq!(files.pending().len(), 1);

    // WHEN: The success reply arrives
    let reply = FileReply {
        kind: FileOpKind::Rename,
        category: FileCategory::Audio,
        file_name: SONG.to_string(),
        new_name: Some("tune.wav".to_string()),
        outcome: Ok("renamed".to_string()),
    };
    let effects = files.on_reply(&reply, &mut selections);

    // THEN: Selection and reload both point at the new path; editor closed
    let new_path = "./files/audio/uploads/tune.wav";
    assert_eq!(selections.get(FileCategory::Audio), Some(new_path));
    assert_eq!(
        reloads(&effects),
        vec![(FileCategory::Audio, Some(new_path.to_string()))]
    );
    assert!(effects.contains(&Effect::EditorClosed(FileCategory::Audio)));
    assert!(files.pending().is_empty());
    assert!(files.editing(FileCategory::Audio).is_none());
}

/// **VALUE**: Verifies a delete error reloads the data listing only and keeps the editor open.
///
/// **WHY THIS MATTERS**: The listing may have changed anyway; the other browsers did not.
///
/// **BUG THIS CATCHES**: Would catch reloads fanned out to every category.
#[test]
fn given_data_delete_when_error_arrives_then_data_reload_only() {
    // GIVEN: A data file open for editing and a delete in flight
    let router = Router::new(false);
    let (mut files, mut selections) = editing(FileCategory::Data, BLOB);
    files.delete(&router, FileCategory::Data, true).unwrap();

    // WHEN: The error reply arrives
    let reply = FileReply {
        kind: FileOpKind::Delete,
        category: FileCategory::Data,
        file_name: BLOB.to_string(),
        new_name: None,
        outcome: Err(Rejection {
            error: "DELETE_FAILED".to_string(),
            message: "file is busy".to_string(),
        }),
    };
    let effects = files.on_reply(&reply, &mut selections);

    // THEN: Error shown, only the data listing reloads, editor stays open
    assert!(effects.contains(&Effect::Error("Failed to delete file: file is busy".to_string())));
    assert_eq!(reloads(&effects), vec![(FileCategory::Data, None)]);
    assert!(files.editing(FileCategory::Data).is_some());
    assert_eq!(selections.get(FileCategory::Data), Some(BLOB));
}

/// **VALUE**: Verifies a delete success clears the matching selection.
///
/// **WHY THIS MATTERS**: A selection pointing at a deleted file would be sent as a job argument.
///
/// **BUG THIS CATCHES**: Would catch the selection surviving the delete.
#[test]
fn given_delete_success_when_applied_then_selection_cleared() {
    let router = Router::new(false);
    let (mut files, mut selections) = editing(FileCategory::Data, BLOB);
    files.delete(&router, FileCategory::Data, true).unwrap();

    let reply = FileReply {
        kind: FileOpKind::Delete,
        category: FileCategory::Data,
        file_name: BLOB.to_string(),
        new_name: None,
        outcome: Ok(String::new()),
    };
    let effects = files.on_reply(&reply, &mut selections);

    assert_eq!(selections.get(FileCategory::Data), None);
    assert!(effects.contains(&Effect::SelectionChanged {
        category: FileCategory::Data,
        path: None,
    }));
}

/// **VALUE**: Verifies renaming to the current name closes the editor without sending.
///
/// **WHY THIS MATTERS**: The server reports same-name renames as errors.
///
/// **BUG THIS CATCHES**: Would catch a rename frame produced for an unchanged name.
#[test]
fn given_same_name_when_rename_then_unchanged_and_nothing_pending() {
    let router = Router::new(false);
    let (mut files, _selections) = editing(FileCategory::Audio, SONG);

    let request = files
        .rename(&router, FileCategory::Audio, " song.wav ", false)
        .unwrap();

    assert_eq!(
        request,
        RenameRequest::Unchanged(vec![Effect::EditorClosed(FileCategory::Audio)])
    );
    assert!(files.pending().is_empty());
}

/// **VALUE**: Verifies mutations are refused while the channel is down.
///
/// **WHY THIS MATTERS**: A request that was never sent must not leave a pending entry.
///
/// **BUG THIS CATCHES**: Would catch pending state recorded before the live check.
#[test]
fn given_channel_down_when_delete_then_not_connected_and_nothing_pending() {
    let router = Router::new(false);
    let (mut files, _selections) = editing(FileCategory::Data, BLOB);

    let error = files.delete(&router, FileCategory::Data, false).unwrap_err();

    assert!(matches!(
        error,
        CoreError::FileOp(FileOpError::NotConnected { .. })
    ));
    assert!(files.pending().is_empty());
}

/// **VALUE**: Verifies only files directly inside the upload dir can be edited.
///
/// **WHY THIS MATTERS**: SFX files are shared and read-only.
///
/// **BUG THIS CATCHES**: Would catch the editor opening on any selection.
#[test]
fn given_selection_outside_uploads_when_open_editor_then_refused() {
    let mut files = FileMutationProtocol::new(ROOT);
    let mut selections = Selections::default();

    let missing = files.open_editor(FileCategory::Audio, &selections).unwrap_err();
    assert!(matches!(missing, FileOpError::NoSelection { .. }));

    selections.set(FileCategory::Audio, "./files/audio/sfx/boom.wav");
    let outside = files.open_editor(FileCategory::Audio, &selections).unwrap_err();
    assert!(matches!(outside, FileOpError::OutsideUploads { .. }));
}

/// **VALUE**: Verifies an abandoned request no longer matches replies.
///
/// **WHY THIS MATTERS**: A frame that failed to send will never get a reply.
///
/// **BUG THIS CATCHES**: Would catch abandon removing the wrong entry.
#[test]
fn given_pending_rename_when_abandoned_then_removed() {
    let router = Router::new(false);
    let (mut files, _selections) = editing(FileCategory::Audio, SONG);
    let RenameRequest::Send(framed) = files
        .rename(&router, FileCategory::Audio, "other.wav", true)
        .unwrap()
    else {
        panic!("expected a frame");
    };

    files.abandon(framed.envelope.id.as_deref());

    assert!(files.pending().is_empty());
}
