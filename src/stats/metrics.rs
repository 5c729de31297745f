//! Status snapshots for relay sessions and the registry

use serde::{Serialize, Serializer};

use crate::session::{RelayState, SessionId};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Point-in-time status of one relay session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStatus {
    /// Session ID
    pub id: SessionId,
    /// Upstream address
    #[serde(rename = "url")]
    pub source: String,
    /// Current state
    pub state: RelayState,
    /// Seconds since the session was created
    pub uptime_seconds: u64,
    /// Failed upstream attempts so far
    pub reconnect_count: u64,
    /// Buffer fill level in `[0, 100]`
    #[serde(serialize_with = "round_1")]
    pub buffer_usage_percent: f64,
    /// Bytes fetched from upstream
    pub total_bytes: u64,
    /// `total_bytes` in MiB
    #[serde(serialize_with = "round_2")]
    pub total_mb: f64,
    /// Seconds since the last chunk was buffered
    #[serde(rename = "last_active_ago")]
    pub last_active_ago_seconds: u64,
}

/// Aggregate status of every registered session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStatus {
    /// Number of registered sessions
    pub active_connections: usize,
    /// Per-session status
    pub streams: Vec<RelayStatus>,
}

impl RegistryStatus {
    /// Build from a list of session statuses
    pub fn new(streams: Vec<RelayStatus>) -> Self {
        Self {
            active_connections: streams.len(),
            streams,
        }
    }

    /// Sum of bytes fetched by all listed sessions
    pub fn total_bytes(&self) -> u64 {
        self.streams.iter().map(|s| s.total_bytes).sum()
    }
}

/// Convert a byte count to MiB
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Percentage of `len` over `capacity`, clamped to `[0, 100]`
pub fn usage_percent(len: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    (100.0 * len as f64 / capacity as f64).clamp(0.0, 100.0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn round_1<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 1))
}

fn round_2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 2))
}
