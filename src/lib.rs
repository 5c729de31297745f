//! Reconnecting HTTP live-stream relay
//!
//! Relays a live byte stream (typically MPEG-TS) from an upstream HTTP source
//! to a downstream client. When upstream drops, the relay reconnects on its
//! own and the client keeps reading from the same response.
//!
//! # Architecture
//!
//! ```text
//!   upstream ──HTTP──► RelaySession fetch task ──► ChunkBuffer ──► RelayOutput ──► client
//!                            │  (reconnects forever)   (bounded)
//!                            ▼
//!                      RelayRegistry ──► /status
//! ```
//!
//! - [`buffer`]: bounded FIFO with backpressure between fetch and client
//! - [`session`]: per-client relay, state machine and fetch loop
//! - [`registry`]: table of active sessions for status reporting
//! - [`upstream`]: the fetch capability and its reqwest implementation
//! - [`server`]: axum routes and listener
//!
//! # Example
//!
//! ```no_run
//! use ts_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> ts_relay::Result<()> {
//! let server = RelayServer::new(ServerConfig::default())?;
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod upstream;

pub use error::{Error, Result};
pub use registry::RelayRegistry;
pub use server::{RelayServer, ServerConfig};
pub use session::{RelayConfig, RelayOutput, RelaySession, RelayState, SessionId};
pub use stats::{RegistryStatus, RelayStatus};
pub use upstream::{HttpFetcher, UpstreamFetcher};
