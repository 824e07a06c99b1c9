//! Wire shapes of the control channel.
//!
//! Every message in either direction is an [`Envelope`]. Outbound traffic is built
//! from [`Command`]s, which always receive a fresh correlation id. Inbound traffic
//! is decoded into [`InboundEvent`]s by exact type string; file-operation replies
//! are tagged with a [`FileCategory`] once, here, so nothing downstream looks at
//! path strings to decide where a reply belongs.

pub mod category;
pub mod commands;
pub mod envelope;
pub mod events;

pub use category::FileCategory;
pub use commands::{Command, JobDescriptor};
pub use envelope::Envelope;
pub use events::{
    BridgeInit, ExecutionStarted, ExecutionStopped, FileOpKind, FileReply, InboundEvent,
    OutputLine, PlaylistCreated, PlaylistFailed, Rejection,
};

/// Envelope type strings.
pub mod types {
    pub const EXECUTION_START: &str = "rpitx.execution.start";
    pub const EXECUTION_STOP: &str = "rpitx.execution.stop";
    pub const EXECUTION_STARTED: &str = "rpitx.execution.started";
    pub const EXECUTION_STOPPED: &str = "rpitx.execution.stopped";
    pub const EXECUTION_ERROR: &str = "rpitx.execution.error";
    pub const EXECUTION_OUTPUT_LINE: &str = "rpitx.execution.output-line";

    pub const FILE_RENAME: &str = "file.rename";
    pub const FILE_RENAME_SUCCESS: &str = "file.rename.success";
    pub const FILE_RENAME_ERROR: &str = "file.rename.error";
    pub const FILE_DELETE: &str = "file.delete";
    pub const FILE_DELETE_SUCCESS: &str = "file.delete.success";
    pub const FILE_DELETE_ERROR: &str = "file.delete.error";

    pub const PLAYLIST_CREATE: &str = "audio.playlist.create";
    pub const PLAYLIST_CREATE_SUCCESS: &str = "audio.playlist.create.success";
    pub const PLAYLIST_CREATE_ERROR: &str = "audio.playlist.create.error";

    pub const BRIDGE_INIT: &str = "wsunixbridge.init";
}
