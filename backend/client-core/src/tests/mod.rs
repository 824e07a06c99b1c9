mod bridge;
mod config;
mod file_ops;
mod playlist;
mod protocol;
mod router;
mod snapshot;
