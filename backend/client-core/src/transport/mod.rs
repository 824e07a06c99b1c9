//! Reconnecting duplex channel to the control server.
//!
//! [`ControlChannel::spawn`] returns immediately. Connection attempts, reads and
//! the fixed-delay reconnect loop run on a background task that reports through
//! [`ChannelEvent`]s; the caller is never blocked on the network.

mod channel;

pub use channel::{ChannelEvent, ChannelHandle, ControlChannel};
