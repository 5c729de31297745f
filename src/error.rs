//! Error types
//!
//! Crate-level error returned by the relay server and session handles.
//! Failures while relaying never surface here: the fetch loop absorbs them
//! and reports them only through session state and counters.

use crate::registry::RegistryError;
use crate::session::SessionId;
use crate::upstream::UpstreamError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream client could not be built
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Registry rejected an operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The session's output stream was already handed out
    #[error("session {0} already has a consumer")]
    AlreadyConsumed(SessionId),

    /// The fetch task panicked or was aborted
    #[error("relay task for session {id} failed: {source}")]
    Task {
        id: SessionId,
        #[source]
        source: tokio::task::JoinError,
    },
}
