pub mod bridge;
pub mod capture;
pub mod config;
pub mod file_ops;
pub mod listing;
pub mod protocol;
pub mod snapshot;
pub mod transport;
pub mod validation;

pub use bridge::BridgeError;
pub use capture::CaptureError;
pub use config::ConfigError;
pub use file_ops::FileOpError;
pub use listing::ListingError;
pub use protocol::ProtocolError;
pub use snapshot::SnapshotError;
pub use transport::TransportError;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    FileOp(#[from] FileOpError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
