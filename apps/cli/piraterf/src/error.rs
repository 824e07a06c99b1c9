use client_core::error::{CaptureError, ConfigError, CoreError, SnapshotError, ValidationError};

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the `piraterf` binary.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PirateRfError {
    /// Bad command-line input
    #[error("CLI Error: {message} {location}")]
    Cli {
        message: String,
        location: ErrorLocation,
    },

    /// Error from client-core (config, transport, validation, ...)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// The server reported a failure for the requested operation
    #[error("Server Error: {message} {location}")]
    Server {
        message: String,
        location: ErrorLocation,
    },

    /// Nothing happened within the wait limit
    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    /// Ctrl-C before the operation finished
    #[error("Interrupted: {message} {location}")]
    Interrupted {
        message: String,
        location: ErrorLocation,
    },

    /// The microphone could not be recorded or the recording not saved
    #[error("Recording Error: {message} {location}")]
    Recording {
        message: String,
        location: ErrorLocation,
    },

    /// Logger setup failed
    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for PirateRfError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        PirateRfError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for PirateRfError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        PirateRfError::from(CoreError::from(error))
    }
}

impl From<ValidationError> for PirateRfError {
    #[track_caller]
    fn from(error: ValidationError) -> Self {
        PirateRfError::from(CoreError::from(error))
    }
}

impl From<SnapshotError> for PirateRfError {
    #[track_caller]
    fn from(error: SnapshotError) -> Self {
        PirateRfError::from(CoreError::from(error))
    }
}

impl From<CaptureError> for PirateRfError {
    #[track_caller]
    fn from(error: CaptureError) -> Self {
        PirateRfError::Recording {
            message: error.user_message(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
