use crate::error::protocol::ProtocolError;
use crate::protocol::category::FileCategory;
use crate::protocol::envelope::Envelope;
use crate::protocol::types;

use common::ErrorLocation;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStarted {
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub initiating_client_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStopped {
    #[serde(default)]
    pub initiating_client_id: Option<String>,
    #[serde(default)]
    pub stopping_client_id: Option<String>,
}

/// Server-side refusal: machine code plus human message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Rejection {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

impl Rejection {
    /// Prefer the human message, fall back to the code.
    pub fn describe(&self) -> &str {
        if self.message.is_empty() {
            &self.error
        } else {
            &self.message
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputLine {
    #[serde(rename = "type", default)]
    pub stream: String,
    #[serde(default)]
    pub line: String,
}

impl OutputLine {
    pub fn render(&self) -> String {
        format!("[{}] {}", self.stream.to_uppercase(), self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileOpKind {
    Rename,
    Delete,
}

impl FileOpKind {
    pub fn verb(self) -> &'static str {
        match self {
            FileOpKind::Rename => "rename",
            FileOpKind::Delete => "delete",
        }
    }
}

/// A rename/delete reply, already tagged with the category of its path.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReply {
    pub kind: FileOpKind,
    pub category: FileCategory,
    pub file_name: String,
    pub new_name: Option<String>,
    pub outcome: Result<String, Rejection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileReplyPayload {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    new_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistCreated {
    #[serde(default)]
    pub playlist_name: String,
    #[serde(default)]
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistFailed {
    #[serde(default)]
    pub playlist_name: String,
    #[serde(flatten)]
    pub rejection: Rejection,
}

/// `wsunixbridge.init` on the bridge channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInit {
    pub writer_socket: String,
    #[serde(default)]
    pub reader_socket: Option<String>,
}

impl BridgeInit {
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, ProtocolError> {
        if envelope.event_type != types::BRIDGE_INIT {
            return Ok(None);
        }
        payload(envelope).map(Some)
    }
}

/// Every control-channel event the client reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ExecutionStarted(ExecutionStarted),
    ExecutionStopped(ExecutionStopped),
    ExecutionError(Rejection),
    OutputLine(OutputLine),
    File(FileReply),
    PlaylistCreated(PlaylistCreated),
    PlaylistFailed(PlaylistFailed),
}

impl InboundEvent {
    /// Decode by exact type match. Unknown types yield `Ok(None)`.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, ProtocolError> {
        let event = match envelope.event_type.as_str() {
            types::EXECUTION_STARTED => InboundEvent::ExecutionStarted(payload(envelope)?),
            types::EXECUTION_STOPPED => InboundEvent::ExecutionStopped(payload(envelope)?),
            types::EXECUTION_ERROR => InboundEvent::ExecutionError(payload(envelope)?),
            types::EXECUTION_OUTPUT_LINE => InboundEvent::OutputLine(payload(envelope)?),
            types::FILE_RENAME_SUCCESS => file_reply(envelope, FileOpKind::Rename, true)?,
            types::FILE_RENAME_ERROR => file_reply(envelope, FileOpKind::Rename, false)?,
            types::FILE_DELETE_SUCCESS => file_reply(envelope, FileOpKind::Delete, true)?,
            types::FILE_DELETE_ERROR => file_reply(envelope, FileOpKind::Delete, false)?,
            types::PLAYLIST_CREATE_SUCCESS => InboundEvent::PlaylistCreated(payload(envelope)?),
            types::PLAYLIST_CREATE_ERROR => InboundEvent::PlaylistFailed(payload(envelope)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
    // Stop events may arrive with no data at all.
    let data = if envelope.data.is_null() {
        Value::Object(Map::new())
    } else {
        envelope.data.clone()
    };

    serde_json::from_value(data).map_err(|e| ProtocolError::Payload {
        event_type: envelope.event_type.clone(),
        message: e.to_string(),
        location: ErrorLocation::here(),
    })
}

fn file_reply(
    envelope: &Envelope,
    kind: FileOpKind,
    success: bool,
) -> Result<InboundEvent, ProtocolError> {
    let raw: FileReplyPayload = payload(envelope)?;
    let category = FileCategory::classify(&raw.file_name);
    let message = raw.message.unwrap_or_default();

    let outcome = if success {
        Ok(message)
    } else {
        Err(Rejection {
            error: raw.error.unwrap_or_default(),
            message,
        })
    };

    Ok(InboundEvent::File(FileReply {
        kind,
        category,
        file_name: raw.file_name,
        new_name: raw.new_name,
        outcome,
    }))
}
