//! Relay state machine
//!
//! ```text
//!   Init ─► Connecting ─► Streaming ─► Stopped
//!              ▲    │         │           ▲
//!              │    ▼         │           │
//!           Reconnecting ◄────┘           │
//!                 └───────────────────────┘
//! ```
//!
//! A stop observed before the loop starts or while a connect is in flight
//! moves `Init` or `Connecting` straight to `Stopped`.
//!
//! Only the fetch task writes the state; readers load it atomically.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle state of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RelayState {
    /// Created, fetch task not yet running
    Init = 0,
    /// Opening the upstream connection
    Connecting = 1,
    /// Upstream connected, chunks flowing into the buffer
    Streaming = 2,
    /// Last attempt failed, waiting out the retry delay
    Reconnecting = 3,
    /// Fetch task exited; terminal
    Stopped = 4,
}

impl RelayState {
    /// Check whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(self, next: RelayState) -> bool {
        use RelayState::*;

        matches!(
            (self, next),
            (Init, Connecting)
                | (Init, Stopped)
                | (Connecting, Streaming)
                | (Connecting, Reconnecting)
                | (Connecting, Stopped)
                | (Streaming, Reconnecting)
                | (Streaming, Stopped)
                | (Reconnecting, Connecting)
                | (Reconnecting, Stopped)
        )
    }

    /// Check if no further transitions are possible
    pub fn is_terminal(self) -> bool {
        self == RelayState::Stopped
    }

    /// Upper-case name used in status output
    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::Init => "INIT",
            RelayState::Connecting => "CONNECTING",
            RelayState::Streaming => "STREAMING",
            RelayState::Reconnecting => "RECONNECTING",
            RelayState::Stopped => "STOPPED",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => RelayState::Init,
            1 => RelayState::Connecting,
            2 => RelayState::Streaming,
            3 => RelayState::Reconnecting,
            _ => RelayState::Stopped,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically readable holder of a [`RelayState`]
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(RelayState::Init as u8))
    }

    pub(crate) fn load(&self) -> RelayState {
        RelayState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`, returning the previous state
    ///
    /// Single writer: callers only request edges of the state machine.
    pub(crate) fn transition(&self, next: RelayState) -> RelayState {
        let prev = RelayState::from_u8(self.0.swap(next as u8, Ordering::AcqRel));
        debug_assert!(
            prev.can_transition_to(next),
            "invalid relay transition {prev} -> {next}"
        );
        prev
    }
}
