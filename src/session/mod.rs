//! Relay sessions
//!
//! A [`RelaySession`] relays one upstream source to one client. It runs a
//! background fetch task that reconnects on any failure, buffers chunks in
//! a bounded [`ChunkBuffer`](crate::buffer::ChunkBuffer), and hands them to
//! the client through a [`RelayOutput`] stream.

pub mod config;
pub mod id;
pub mod output;
pub mod relay;
pub mod state;

pub use config::RelayConfig;
pub use id::SessionId;
pub use output::RelayOutput;
pub use relay::RelaySession;
pub use state::RelayState;
