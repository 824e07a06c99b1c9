use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Client-side checks that stop a command before it reaches the server.
#[derive(Debug, ThisError)]
pub enum ValidationError {
    #[error("Missing Field Error: {module}.{field} {location}")]
    MissingField {
        module: String,
        field: String,
        location: ErrorLocation,
    },

    #[error("Invalid Field Error: {module}.{field}: {message} {location}")]
    InvalidField {
        module: String,
        field: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Unknown Module Error: {module} {location}")]
    UnknownModule {
        module: String,
        location: ErrorLocation,
    },

    #[error("Already Executing Error: {message} {location}")]
    AlreadyExecuting {
        message: String,
        location: ErrorLocation,
    },

    #[error("Playlist Error: {message} {location}")]
    Playlist {
        message: String,
        location: ErrorLocation,
    },
}
