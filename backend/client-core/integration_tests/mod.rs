//! Integration tests for client-core.
//!
//! These drive a whole [`client_core::session::Session`] against real local
//! servers: a WebSocket control/bridge server bound to an ephemeral port and a
//! wiremock HTTP server for listings and uploads.

mod session_tests;
