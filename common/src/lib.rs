//! Shared building blocks for the PIrateRF control client.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking and small value types
//! - **client-core**: protocol, session state machines and the live audio bridge
//! - **piraterf**: command-line front end wiring everything together

pub mod error;
pub mod http_status;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use http_status::HttpStatusCode;
