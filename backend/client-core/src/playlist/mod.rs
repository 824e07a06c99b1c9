//! Playlist drafting and the `audio.playlist.create` exchange.

use crate::error::CoreError;
use crate::error::transport::TransportError;
use crate::error::validation::ValidationError;
use crate::protocol::category::file_name;
use crate::protocol::{Command, FileCategory, PlaylistCreated, PlaylistFailed};
use crate::router::{Framed, Router};
use crate::session::effect::Effect;

use common::ErrorLocation;

use std::time::Duration;

use log::{info, warn};

/// How long an inline playlist error stays visible.
pub const PLAYLIST_ERROR_DISPLAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Upload,
    Sfx,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub server_path: String,
    pub display_path: String,
    pub source_type: SourceType,
}

impl PlaylistEntry {
    /// Entry for a server path; SFX is recognised by its directory.
    pub fn from_server_path(server_path: impl Into<String>) -> Self {
        let server_path = server_path.into();
        let source_type = if server_path.contains("/sfx/") {
            SourceType::Sfx
        } else {
            SourceType::Upload
        };
        let name = file_name(&server_path).to_string();
        let display_path = match source_type {
            SourceType::Sfx => format!("sfx/{name}"),
            SourceType::Upload => name.clone(),
        };

        Self {
            name,
            server_path,
            display_path,
            source_type,
        }
    }
}

/// A submitted playlist waiting for the server's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedPlaylist {
    pub name: String,
    pub entries: Vec<PlaylistEntry>,
    pub request_id: Option<String>,
}

/// The editable draft plus at most one submitted, frozen playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistDraft {
    name: String,
    entries: Vec<PlaylistEntry>,
    submitted: Option<SubmittedPlaylist>,
}

impl PlaylistDraft {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn submitted(&self) -> Option<&SubmittedPlaylist> {
        self.submitted.as_ref()
    }

    pub fn append(&mut self, entry: PlaylistEntry) -> Vec<Effect> {
        self.entries.push(entry);
        self.changed()
    }

    pub fn remove(&mut self, index: usize) -> Option<PlaylistEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Move an entry to another position; out-of-range moves are ignored.
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn clear(&mut self) -> Vec<Effect> {
        self.entries.clear();
        self.name.clear();
        self.changed()
    }

    /// Freeze the draft into a create command and start a fresh draft.
    ///
    /// Refused while an earlier submission is waiting for the server.
    pub fn submit(&mut self, router: &Router, live: bool) -> Result<Framed, CoreError> {
        if let Some(pending) = &self.submitted {
            return Err(ValidationError::Playlist {
                message: format!("Playlist {} is still being created", pending.name),
                location: ErrorLocation::here(),
            }
            .into());
        }

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Playlist {
                message: "Please enter a playlist name".to_string(),
                location: ErrorLocation::here(),
            }
            .into());
        }

        if self.entries.is_empty() {
            return Err(ValidationError::Playlist {
                message: "Playlist is empty. Add some files first.".to_string(),
                location: ErrorLocation::here(),
            }
            .into());
        }

        if !live {
            return Err(TransportError::NotLive {
                message: "WebSocket not connected".to_string(),
                location: ErrorLocation::here(),
            }
            .into());
        }

        let framed = router.frame(Command::CreatePlaylist {
            playlist_file_name: name.clone(),
            files: self
                .entries
                .iter()
                .map(|entry| entry.server_path.clone())
                .collect(),
        })?;

        info!(
            "Creating playlist {name} with {} file(s)",
            self.entries.len()
        );

        self.submitted = Some(SubmittedPlaylist {
            name,
            entries: std::mem::take(&mut self.entries),
            request_id: framed.envelope.id.clone(),
        });
        self.name.clear();

        Ok(framed)
    }

    /// The create frame never left the client: hand the entries back.
    pub fn abandon(&mut self) {
        self.restore_submitted();
    }

    pub fn on_created(&mut self, event: &PlaylistCreated) -> Vec<Effect> {
        info!("Playlist created: {} at {}", event.playlist_name, event.file_path);
        self.submitted = None;

        let select = (!event.file_path.is_empty()).then(|| event.file_path.clone());
        vec![
            Effect::Loading(None),
            Effect::system(format!(
                "Playlist created successfully: {}",
                event.playlist_name
            )),
            Effect::ReloadListing {
                category: FileCategory::Audio,
                select,
            },
        ]
    }

    /// Show the error and return the submitted entries to an empty draft.
    pub fn on_create_failed(&mut self, event: &PlaylistFailed) -> Vec<Effect> {
        let message = event.rejection.describe().to_string();
        warn!("Playlist {} failed: {message}", event.playlist_name);

        self.restore_submitted();

        let mut effects = vec![
            Effect::Loading(None),
            Effect::system(format!("Failed to create playlist: {message}")),
            Effect::PlaylistError {
                message: format!("Error: {message}"),
                display_for: PLAYLIST_ERROR_DISPLAY,
            },
        ];
        effects.extend(self.changed());
        effects
    }

    fn restore_submitted(&mut self) {
        let Some(submitted) = self.submitted.take() else {
            return;
        };

        if self.entries.is_empty() {
            self.entries = submitted.entries;
            if self.name.is_empty() {
                self.name = submitted.name;
            }
        }
    }

    fn changed(&self) -> Vec<Effect> {
        vec![Effect::PlaylistChanged {
            entries: self.entries.len(),
        }]
    }
}
