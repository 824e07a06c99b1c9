pub mod bridge;
pub mod config;
pub mod error;
pub mod execution;
pub mod file_ops;
pub mod listing;
pub mod modules;
pub mod playlist;
pub mod protocol;
pub mod recording;
pub mod router;
pub mod session;
pub mod snapshot;
pub mod transport;

#[cfg(test)]
mod tests;

pub const PIRATERF_SERVER_HOSTNAME: &str = "127.0.0.1";
pub const PIRATERF_SERVER_BASE_URL: &str =
    const_format::concatcp!("http://", PIRATERF_SERVER_HOSTNAME, ":8080");
