//! Relay session configuration

use std::time::Duration;

/// Default total buffer budget per session (10 MiB)
pub const DEFAULT_BUFFER_CAPACITY_BYTES: usize = 10 * 1024 * 1024;

/// Default size of a chunk moved from upstream into the buffer
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Per-session relay options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Total bytes the buffer may hold
    pub buffer_capacity_bytes: usize,

    /// Bytes per chunk read from upstream
    pub chunk_size: usize,

    /// Pause between a failed attempt and the next connect
    pub retry_delay: Duration,

    /// Bound on connecting and on waiting for each upstream chunk
    pub read_timeout: Duration,

    /// How long the client side waits on an empty buffer before re-checking
    /// whether the session is still running
    pub consume_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_capacity_bytes: DEFAULT_BUFFER_CAPACITY_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_delay: Duration::from_secs(1),
            read_timeout: Duration::from_secs(10),
            consume_timeout: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    /// Number of chunks the session buffer holds (at least 1)
    pub fn buffer_chunks(&self) -> usize {
        (self.buffer_capacity_bytes / self.chunk_size.max(1)).max(1)
    }

    /// Set the buffer budget in bytes
    pub fn buffer_capacity_bytes(mut self, bytes: usize) -> Self {
        self.buffer_capacity_bytes = bytes;
        self
    }

    /// Set chunk size (at least 1 byte)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set retry delay
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set consume timeout
    pub fn consume_timeout(mut self, timeout: Duration) -> Self {
        self.consume_timeout = timeout;
        self
    }
}
