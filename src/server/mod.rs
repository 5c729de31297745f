//! Relay HTTP server
//!
//! Maps `/live?url=` requests to relay sessions and exposes `/status`.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use routes::{build_router, AppState};
