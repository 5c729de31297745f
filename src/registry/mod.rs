//! Registry of active relay sessions
//!
//! The registry only tracks sessions for lookup and status reporting; it
//! neither drives nor owns them. The HTTP layer owns each session, registers
//! it when a client starts a relay and unregisters it when the client goes
//! away.
//!
//! ```text
//!                  Arc<RelayRegistry>
//!          ┌──────────────────────────────┐
//!          │ sessions: HashMap<SessionId, │
//!          │     Weak<RelaySession>>      │
//!          └──────────────┬───────────────┘
//!                         │
//!      ┌──────────────────┼──────────────────┐
//!      ▼                  ▼                  ▼
//!  /live client       /live client        /status
//!  register()         unregister()        snapshot()
//! ```
//!
//! Insert, remove and snapshot each take the single lock once, so a
//! snapshot never mixes states from before and after a concurrent change.

pub mod error;
pub mod store;

pub use error::RegistryError;
pub use store::RelayRegistry;
