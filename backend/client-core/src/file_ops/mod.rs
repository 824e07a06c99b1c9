//! Rename and delete of uploaded files.
//!
//! Requests address the full server path of the file open in a category's
//! editor. Replies are matched to the oldest pending request of the same
//! operation kind and category; the request id is kept alongside so matching
//! can move to echoed ids without touching callers.

mod selection;

pub use selection::Selections;

use crate::error::CoreError;
use crate::error::file_ops::FileOpError;
use crate::protocol::category::{file_name, parent_dir};
use crate::protocol::{Command, FileCategory, FileOpKind, FileReply};
use crate::router::{Framed, Router};
use crate::session::effect::Effect;

use common::ErrorLocation;

use std::collections::BTreeMap;

use log::{debug, info, warn};

/// File currently open for editing in one browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTarget {
    pub category: FileCategory,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFileOp {
    pub kind: FileOpKind,
    pub category: FileCategory,
    pub path: String,
    pub new_name: Option<String>,
    pub request_id: Option<String>,
}

/// Result of asking for a rename.
#[derive(Debug, Clone, PartialEq)]
pub enum RenameRequest {
    /// Same name as before: nothing to send, the editor was closed.
    Unchanged(Vec<Effect>),
    Send(Framed),
}

pub struct FileMutationProtocol {
    files_root: String,
    editing: BTreeMap<FileCategory, EditTarget>,
    pending: Vec<PendingFileOp>,
}

impl FileMutationProtocol {
    pub fn new(files_root: impl Into<String>) -> Self {
        Self {
            files_root: files_root.into(),
            editing: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn editing(&self, category: FileCategory) -> Option<&EditTarget> {
        self.editing.get(&category)
    }

    pub fn pending(&self) -> &[PendingFileOp] {
        &self.pending
    }

    /// Open the editor on the category's selection.
    ///
    /// Only files inside the category's upload directory are editable.
    pub fn open_editor(
        &mut self,
        category: FileCategory,
        selections: &Selections,
    ) -> Result<Vec<Effect>, FileOpError> {
        let path = selections
            .get(category)
            .ok_or_else(|| FileOpError::NoSelection {
                message: format!("No {category} file selected"),
                location: ErrorLocation::here(),
            })?;

        if !category.is_upload_path(path, &self.files_root) {
            return Err(FileOpError::OutsideUploads {
                path: path.to_string(),
                location: ErrorLocation::here(),
            });
        }

        let target = EditTarget {
            category,
            path: path.to_string(),
            name: file_name(path).to_string(),
        };
        debug!("Editing {category} file {}", target.path);

        let effect = Effect::EditorOpened {
            category,
            name: target.name.clone(),
        };
        self.editing.insert(category, target);
        Ok(vec![effect])
    }

    pub fn close_editor(&mut self, category: FileCategory) -> Vec<Effect> {
        match self.editing.remove(&category) {
            Some(_) => vec![Effect::EditorClosed(category)],
            None => Vec::new(),
        }
    }

    pub fn rename(
        &mut self,
        router: &Router,
        category: FileCategory,
        new_name: &str,
        live: bool,
    ) -> Result<RenameRequest, CoreError> {
        let new_name = new_name.trim();
        let target = self.target(category)?;

        if new_name.is_empty() {
            return Err(FileOpError::NoSelection {
                message: "New file name is empty".to_string(),
                location: ErrorLocation::here(),
            }
            .into());
        }

        if new_name == target.name {
            debug!("Rename of {} to the same name, closing editor", target.path);
            return Ok(RenameRequest::Unchanged(self.close_editor(category)));
        }

        ensure_live(live)?;

        let path = target.path.clone();
        let framed = router.frame(Command::RenameFile {
            file_path: path.clone(),
            new_name: new_name.to_string(),
        })?;

        info!("Renaming {path} to {new_name}");
        self.pending.push(PendingFileOp {
            kind: FileOpKind::Rename,
            category,
            path,
            new_name: Some(new_name.to_string()),
            request_id: framed.envelope.id.clone(),
        });

        Ok(RenameRequest::Send(framed))
    }

    pub fn delete(
        &mut self,
        router: &Router,
        category: FileCategory,
        live: bool,
    ) -> Result<Framed, CoreError> {
        let path = self.target(category)?.path.clone();
        ensure_live(live)?;

        let framed = router.frame(Command::DeleteFile {
            file_path: path.clone(),
        })?;

        info!("Deleting {path}");
        self.pending.push(PendingFileOp {
            kind: FileOpKind::Delete,
            category,
            path,
            new_name: None,
            request_id: framed.envelope.id.clone(),
        });

        Ok(framed)
    }

    /// Forget a request whose frame never left the client.
    pub fn abandon(&mut self, request_id: Option<&str>) {
        self.pending
            .retain(|op| op.request_id.as_deref() != request_id);
    }

    /// Apply a reply. The selection follows a renamed file and is cleared for a
    /// deleted one; the listing is reloaded either way.
    pub fn on_reply(&mut self, reply: &FileReply, selections: &mut Selections) -> Vec<Effect> {
        let category = reply.category;
        let verb = reply.kind.verb();

        match self
            .pending
            .iter()
            .position(|op| op.kind == reply.kind && op.category == category)
        {
            Some(index) => {
                let op = self.pending.remove(index);
                debug!(
                    "Matched {verb} reply for {} to request {:?}",
                    reply.file_name, op.request_id
                );
            }
            None => debug!("No pending {verb} request for {}", reply.file_name),
        }

        let mut effects = vec![Effect::Loading(None)];

        match (&reply.outcome, reply.kind) {
            (Ok(_), FileOpKind::Rename) => {
                let new_name = reply.new_name.as_deref().unwrap_or_default();
                let new_path = format!("{}/{new_name}", parent_dir(&reply.file_name));
                info!("Renamed {} to {new_path}", reply.file_name);

                effects.push(Effect::system(format!(
                    "File renamed from {} to {new_name}",
                    reply.file_name
                )));
                effects.extend(self.close_editor(category));

                selections.set(category, new_path.clone());
                effects.push(Effect::SelectionChanged {
                    category,
                    path: Some(new_path.clone()),
                });
                effects.push(Effect::ReloadListing {
                    category,
                    select: Some(new_path),
                });
            }
            (Ok(_), FileOpKind::Delete) => {
                info!("Deleted {}", reply.file_name);
                effects.push(Effect::system(format!("File deleted: {}", reply.file_name)));
                effects.extend(self.close_editor(category));

                if selections.get(category) == Some(reply.file_name.as_str()) {
                    selections.clear(category);
                    effects.push(Effect::SelectionChanged {
                        category,
                        path: None,
                    });
                }
                effects.push(Effect::ReloadListing {
                    category,
                    select: None,
                });
            }
            (Err(rejection), _) => {
                warn!(
                    "Failed to {verb} {}: {} {}",
                    reply.file_name, rejection.error, rejection.message
                );
                effects.push(Effect::Error(format!(
                    "Failed to {verb} file: {}",
                    rejection.describe()
                )));
                effects.push(Effect::ReloadListing {
                    category,
                    select: None,
                });
            }
        }

        effects
    }

    fn target(&self, category: FileCategory) -> Result<&EditTarget, FileOpError> {
        self.editing
            .get(&category)
            .ok_or_else(|| FileOpError::NoSelection {
                message: format!("No {category} file open for editing"),
                location: ErrorLocation::here(),
            })
    }
}

fn ensure_live(live: bool) -> Result<(), FileOpError> {
    if live {
        Ok(())
    } else {
        Err(FileOpError::NotConnected {
            message: "WebSocket not connected".to_string(),
            location: ErrorLocation::here(),
        })
    }
}
