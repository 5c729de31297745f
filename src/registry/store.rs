//! Relay registry implementation

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::session::{RelaySession, SessionId};
use crate::stats::RegistryStatus;

use super::error::RegistryError;

type SessionMap = HashMap<SessionId, Weak<RelaySession>>;

/// Process-wide table of active relay sessions
///
/// Entries are weak: whoever started a session owns it, the registry only
/// finds it. A session dropped without being unregistered disappears from
/// lookups and snapshots.
///
/// Thread-safe via `RwLock`. The lock is never held across an await point,
/// so it is safe to use from sync code such as `Drop` impls.
#[derive(Debug, Default)]
pub struct RelayRegistry {
    sessions: RwLock<SessionMap>,
}

impl RelayRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionMap> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionMap> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session under its ID
    ///
    /// IDs are unique per process, so a collision means a session was
    /// registered twice. The existing entry is kept and an error returned.
    pub fn register(&self, session: &Arc<RelaySession>) -> Result<(), RegistryError> {
        let id = session.id();
        let mut sessions = self.write();

        if sessions.contains_key(&id) {
            tracing::warn!(session_id = %id, "Session already registered");
            return Err(RegistryError::DuplicateSession(id));
        }

        sessions.insert(id, Arc::downgrade(session));
        tracing::debug!(session_id = %id, active = sessions.len(), "Session registered");
        Ok(())
    }

    /// Remove a session, returning it if it was registered and is still alive
    pub fn unregister(&self, id: SessionId) -> Option<Arc<RelaySession>> {
        let mut sessions = self.write();
        let removed = sessions.remove(&id)?;

        tracing::debug!(session_id = %id, active = sessions.len(), "Session unregistered");
        removed.upgrade()
    }

    /// Look up a session by ID
    pub fn get(&self, id: SessionId) -> Option<Arc<RelaySession>> {
        self.read().get(&id).and_then(Weak::upgrade)
    }

    /// All live registered sessions at one point in time
    pub fn snapshot(&self) -> Vec<Arc<RelaySession>> {
        self.read().values().filter_map(Weak::upgrade).collect()
    }

    /// Status of every registered session
    ///
    /// Built from a single snapshot, so the count always matches the list.
    /// Sessions are ordered by ID.
    pub fn status(&self) -> RegistryStatus {
        let mut streams: Vec<_> = self.snapshot().iter().map(|s| s.status()).collect();
        streams.sort_by_key(|s| s.id);
        RegistryStatus::new(streams)
    }

    /// Number of registered entries, including ones whose owner is gone
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no session is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Stop every registered session, leaving the entries in place
    ///
    /// Used on shutdown; clients see their streams end and unregister as
    /// usual.
    pub fn stop_all(&self) -> usize {
        let sessions = self.snapshot();
        for session in &sessions {
            session.stop();
        }
        if !sessions.is_empty() {
            tracing::info!(count = sessions.len(), "Stopped all relay sessions");
        }
        sessions.len()
    }
}
