use common::ErrorLocation;

use std::io::{Error as IoError, ErrorKind};
use std::panic::Location;

use thiserror::Error as ThisError;

/// Microphone acquisition failures.
#[derive(Debug, ThisError)]
pub enum CaptureError {
    #[error("No Device Error: {message} {location}")]
    NoDevice {
        message: String,
        location: ErrorLocation,
    },

    #[error("Permission Denied Error: {message} {location}")]
    PermissionDenied {
        message: String,
        location: ErrorLocation,
    },

    #[error("Constraints Rejected Error: {message} {location}")]
    ConstraintsRejected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Capture IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl CaptureError {
    pub fn is_constraint_rejection(&self) -> bool {
        matches!(self, CaptureError::ConstraintsRejected { .. })
    }

    /// What the operator is told when the microphone cannot be used.
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::NoDevice { .. } => "No microphone found".to_string(),
            CaptureError::PermissionDenied { .. } => "Microphone permission denied".to_string(),
            other => format!("Microphone access failed: {other}"),
        }
    }
}

impl From<IoError> for CaptureError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        let location = ErrorLocation::from(Location::caller());
        match error.kind() {
            ErrorKind::NotFound => CaptureError::NoDevice {
                message: error.to_string(),
                location,
            },
            ErrorKind::PermissionDenied => CaptureError::PermissionDenied {
                message: error.to_string(),
                location,
            },
            _ => CaptureError::Io {
                message: error.to_string(),
                location,
            },
        }
    }
}
