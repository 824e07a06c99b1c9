use crate::error::protocol::ProtocolError;
use crate::protocol::envelope::Envelope;
use crate::protocol::types;

use common::ErrorLocation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Payload of `rpitx.execution.start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub module_name: String,
    pub args: Map<String, Value>,
    pub timeout: u64,
    pub play_once: bool,
    pub intro: Option<String>,
    pub outro: Option<String>,
}

impl JobDescriptor {
    pub fn new(module_name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            module_name: module_name.into(),
            args,
            timeout: 0,
            play_once: false,
            intro: None,
            outro: None,
        }
    }
}

/// Everything the client can ask the control server to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartExecution(JobDescriptor),
    StopExecution,
    RenameFile {
        file_path: String,
        new_name: String,
    },
    DeleteFile {
        file_path: String,
    },
    CreatePlaylist {
        playlist_file_name: String,
        files: Vec<String>,
    },
}

impl Command {
    pub fn event_type(&self) -> &'static str {
        match self {
            Command::StartExecution(_) => types::EXECUTION_START,
            Command::StopExecution => types::EXECUTION_STOP,
            Command::RenameFile { .. } => types::FILE_RENAME,
            Command::DeleteFile { .. } => types::FILE_DELETE,
            Command::CreatePlaylist { .. } => types::PLAYLIST_CREATE,
        }
    }

    fn payload(&self) -> Result<Value, ProtocolError> {
        let data = match self {
            Command::StartExecution(job) => {
                serde_json::to_value(job).map_err(|e| ProtocolError::Encode {
                    message: e.to_string(),
                    location: ErrorLocation::here(),
                })?
            }
            Command::StopExecution => json!({}),
            Command::RenameFile {
                file_path,
                new_name,
            } => json!({ "filePath": file_path, "newName": new_name }),
            Command::DeleteFile { file_path } => json!({ "filePath": file_path }),
            Command::CreatePlaylist {
                playlist_file_name,
                files,
            } => json!({ "playlistFileName": playlist_file_name, "files": files }),
        };
        Ok(data)
    }

    /// Frame the command with a fresh correlation id.
    pub fn into_envelope(self) -> Result<Envelope, ProtocolError> {
        let data = self.payload()?;
        Ok(Envelope::new(self.event_type(), data).with_id(Uuid::new_v4().to_string()))
    }
}
