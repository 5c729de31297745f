//! Registry error types

use crate::session::SessionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A different session is already registered under this ID
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}
