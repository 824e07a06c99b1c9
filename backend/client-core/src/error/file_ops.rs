use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum FileOpError {
    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Selection Error: {message} {location}")]
    NoSelection {
        message: String,
        location: ErrorLocation,
    },

    #[error("Outside Uploads Error: {path} {location}")]
    OutsideUploads {
        path: String,
        location: ErrorLocation,
    },
}
