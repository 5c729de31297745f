//! Relay statistics and status reporting

pub mod metrics;

pub use metrics::{bytes_to_mb, usage_percent, RegistryStatus, RelayStatus};
