// Unit tests for playlist drafting and the create exchange

use crate::error::CoreError;
use crate::error::validation::ValidationError;
use crate::playlist::{PLAYLIST_ERROR_DISPLAY, PlaylistDraft, PlaylistEntry, SourceType};
use crate::protocol::{FileCategory, PlaylistCreated, PlaylistFailed, Rejection, types};
use crate::router::Router;
use crate::session::effect::Effect;

fn draft_with_two() -> PlaylistDraft {
    let mut draft = PlaylistDraft::default();
    draft.set_name("night");
    draft.append(PlaylistEntry::from_server_path("./files/audio/uploads/a.wav"));
    draft.append(PlaylistEntry::from_server_path("./files/audio/sfx/b.wav"));
    draft
}

/// **VALUE**: Verifies entries classify SFX by directory and keep upload names bare.
///
/// **WHY THIS MATTERS**: The draft shows where each entry came from.
///
/// **BUG THIS CATCHES**: Would catch every entry being labelled as an upload.
#[test]
fn given_server_paths_when_entries_built_then_source_type_and_display_path() {
    let upload = PlaylistEntry::from_server_path("./files/audio/uploads/a.wav");
    let sfx = PlaylistEntry::from_server_path("./files/audio/sfx/b.wav");

    assert_eq!(upload.source_type, SourceType::Upload);
    assert_eq!(upload.display_path, "a.wav");
    assert_eq!(sfx.source_type, SourceType::Sfx);
    assert_eq!(sfx.display_path, "sfx/b.wav");
    assert_eq!(sfx.name, "b.wav");
}

/// **VALUE**: Verifies submit freezes the draft and frames its server paths in order.
///
/// **WHY THIS MATTERS**: Edits after submit must go to a new draft, not the one in flight.
///
/// **BUG THIS CATCHES**: Would catch the submitted entries being shared with the draft.
#[test]
fn given_valid_draft_when_submitted_then_frozen_and_new_draft_empty() {
    // GIVEN: A named draft with two entries
    let router = Router::new(false);
    let mut draft = draft_with_two();

    // WHEN: Submitting
    let framed = draft.submit(&router, true).unwrap();

    // THEN: The command carries both paths, the draft is empty, the submission is frozen
    assert_eq!(framed.envelope.event_type, types::PLAYLIST_CREATE);
    assert_eq!(framed.envelope.data["playlistFileName"], "night");
    assert_eq!(
        framed.envelope.data["files"],
        serde_json::json!(["./files/audio/uploads/a.wav", "./files/audio/sfx/b.wav"])
    );
    assert!(draft.entries().is_empty());
    assert_eq!(draft.name(), "");
    let submitted = draft.submitted().expect("submitted");
    assert_eq!(submitted.entries.len(), 2);
    assert_eq!(submitted.request_id, framed.envelope.id);
}

/// **VALUE**: Verifies submit validation: name required, entries required, channel live.
///
/// **WHY THIS MATTERS**: Each failure has its own message for the operator.
///
/// **BUG THIS CATCHES**: Would catch an empty playlist reaching the server.
#[test]
fn given_invalid_drafts_when_submitted_then_rejected() {
    let router = Router::new(false);

    let mut unnamed = draft_with_two();
    unnamed.set_name("  ");
    assert!(matches!(
        unnamed.submit(&router, true),
        Err(CoreError::Validation(ValidationError::Playlist { .. }))
    ));

    let mut empty = PlaylistDraft::default();
    empty.set_name("x");
    assert!(matches!(
        empty.submit(&router, true),
        Err(CoreError::Validation(ValidationError::Playlist { .. }))
    ));

    let mut offline = draft_with_two();
    assert!(matches!(
        offline.submit(&router, false),
        Err(CoreError::Transport(_))
    ));
    assert_eq!(offline.entries().len(), 2);
}

/// **VALUE**: Verifies a failed create shows the error for 5 s and restores the entries.
///
/// **WHY THIS MATTERS**: The operator can fix the name and retry without rebuilding the list.
///
/// **BUG THIS CATCHES**: Would catch entries being lost when the server refuses the playlist.
#[test]
fn given_submitted_when_create_fails_then_entries_restored_for_retry() {
    // GIVEN: A submitted playlist
    let router = Router::new(false);
    let mut draft = draft_with_two();
    draft.submit(&router, true).unwrap();

    // WHEN: The server refuses it
    let effects = draft.on_create_failed(&PlaylistFailed {
        playlist_name: "night".to_string(),
        rejection: Rejection {
            error: "PLAYLIST_EXISTS".to_string(),
            message: "already exists".to_string(),
        },
    });

    // THEN: Inline error for the display window, entries and name back in the draft
    assert!(effects.contains(&Effect::PlaylistError {
        message: "Error: already exists".to_string(),
        display_for: PLAYLIST_ERROR_DISPLAY,
    }));
    assert_eq!(draft.entries().len(), 2);
    assert_eq!(draft.name(), "night");
    assert!(draft.submitted().is_none());
}

/// **VALUE**: Verifies a second submit is refused while the first is still pending.
///
/// **WHY THIS MATTERS**: A failed creation hands its entries back to the draft, so the
/// pending submission must stay the one the server is answering.
///
/// **BUG THIS CATCHES**: Would catch the pending submission being overwritten and its
/// entries lost when the first creation fails.
#[test]
fn given_pending_submission_when_submitted_again_then_rejected_and_first_kept() {
    // GIVEN: One playlist in flight and a new draft
    let router = Router::new(false);
    let mut draft = draft_with_two();
    draft.submit(&router, true).unwrap();
    draft.set_name("morning");
    draft.append(PlaylistEntry::from_server_path("./files/audio/uploads/c.wav"));

    // WHEN: Submitting the new draft before the server answers
    let result = draft.submit(&router, true);

    // THEN: Refused; the pending submission and the new draft are untouched
    assert!(matches!(
        result,
        Err(CoreError::Validation(ValidationError::Playlist { .. }))
    ));
    let pending = draft.submitted().expect("first submission pending");
    assert_eq!(pending.name, "night");
    assert_eq!(pending.entries.len(), 2);
    assert_eq!(draft.entries().len(), 1);

    // WHEN: The first creation fails
    draft.on_create_failed(&PlaylistFailed {
        playlist_name: "night".to_string(),
        rejection: Rejection {
            error: "PLAYLIST_EXISTS".to_string(),
            message: "already exists".to_string(),
        },
    });

    // THEN: Nothing pending, the newer draft kept
    assert!(draft.submitted().is_none());
    assert_eq!(draft.name(), "morning");
    assert_eq!(draft.entries().len(), 1);
}

/// **VALUE**: Verifies success reloads the audio listing and selects the new playlist.
///
/// **WHY THIS MATTERS**: The new playlist is what the operator wants to broadcast next.
///
/// **BUG THIS CATCHES**: Would catch the reload targeting the wrong category.
#[test]
fn given_submitted_when_created_then_audio_reload_selects_playlist() {
    let router = Router::new(false);
    let mut draft = draft_with_two();
    draft.submit(&router, true).unwrap();

    let effects = draft.on_created(&PlaylistCreated {
        playlist_name: "night".to_string(),
        file_path: "./files/audio/uploads/night.wav".to_string(),
    });

    assert!(effects.contains(&Effect::ReloadListing {
        category: FileCategory::Audio,
        select: Some("./files/audio/uploads/night.wav".to_string()),
    }));
    assert!(draft.submitted().is_none());
    assert!(draft.entries().is_empty());
}

/// **VALUE**: Verifies reordering and removal, with out-of-range moves ignored.
///
/// **WHY THIS MATTERS**: Playlist order is broadcast order.
///
/// **BUG THIS CATCHES**: Would catch a panic on out-of-range indices.
#[test]
fn given_draft_when_reordered_then_order_changes_and_bad_moves_ignored() {
    let mut draft = draft_with_two();

    assert!(draft.move_entry(1, 0));
    assert_eq!(draft.entries()[0].name, "b.wav");
    assert!(!draft.move_entry(0, 5));
    assert_eq!(draft.remove(9), None);
    assert_eq!(draft.remove(0).map(|entry| entry.name), Some("b.wav".to_string()));
    assert_eq!(draft.entries().len(), 1);
}
