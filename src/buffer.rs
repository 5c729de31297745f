//! Bounded chunk buffer between the upstream fetch loop and the client
//!
//! A fixed-capacity FIFO of byte chunks. The fetch loop is the only writer
//! and the client output stream the only reader:
//!
//! ```text
//!   fetch loop ──put()──► [ chunk | chunk | ... | EOS ] ──get()──► client
//!        ▲                                                  │
//!        └──────── waits while full (backpressure) ◄────────┘
//! ```
//!
//! The end-of-stream marker does not count against capacity, so `stop()`
//! can always deliver it to a reader waiting on an empty buffer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::stats::usage_percent;

/// An element stored in the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferItem {
    /// A chunk of upstream bytes
    Data(Bytes),
    /// No further data will arrive
    EndOfStream,
}

/// Error returned by [`ChunkBuffer::get`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Nothing arrived within the wait
    #[error("buffer empty after waiting {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Default)]
struct Queue {
    items: VecDeque<BufferItem>,
    /// Number of `Data` items in `items`
    data_len: usize,
}

/// Fixed-capacity FIFO of byte chunks with backpressure
#[derive(Debug)]
pub struct ChunkBuffer {
    queue: Mutex<Queue>,
    capacity: usize,
    /// Signalled when an item is pushed
    readable: Notify,
    /// Signalled when a data item is popped
    writable: Notify,
}

impl ChunkBuffer {
    /// Create a buffer holding at most `capacity` data chunks (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            capacity: capacity.max(1),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        // The queue is never left half-updated, so a poisoned lock is still usable.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of data chunks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of data chunks currently buffered
    pub fn len(&self) -> usize {
        self.lock().data_len
    }

    /// Check if no data chunks are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill level as a percentage in `[0, 100]`
    pub fn usage_percent(&self) -> f64 {
        usage_percent(self.len(), self.capacity)
    }

    /// Append a chunk, waiting while the buffer is full
    ///
    /// Cancel-safe: if the future is dropped before it completes, the chunk
    /// was not inserted.
    pub async fn put(&self, chunk: Bytes) {
        loop {
            {
                let mut queue = self.lock();
                if queue.data_len < self.capacity {
                    queue.items.push_back(BufferItem::Data(chunk));
                    queue.data_len += 1;
                    drop(queue);
                    self.readable.notify_one();
                    return;
                }
            }
            self.writable.notified().await;
        }
    }

    /// Append the end-of-stream marker without waiting
    ///
    /// The marker bypasses the capacity check.
    pub fn put_end_of_stream(&self) {
        self.lock().items.push_back(BufferItem::EndOfStream);
        self.readable.notify_one();
    }

    /// Remove the oldest item without waiting
    pub fn try_get(&self) -> Option<BufferItem> {
        let item = {
            let mut queue = self.lock();
            let item = queue.items.pop_front()?;
            if matches!(item, BufferItem::Data(_)) {
                queue.data_len -= 1;
            }
            item
        };
        if matches!(item, BufferItem::Data(_)) {
            self.writable.notify_one();
        }
        Some(item)
    }

    /// Remove the oldest item, waiting up to `timeout` if the buffer is empty
    pub async fn get(&self, timeout: Duration) -> Result<BufferItem, BufferError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_get() {
                return Ok(item);
            }
            if tokio::time::timeout_at(deadline, self.readable.notified())
                .await
                .is_err()
            {
                // A push may have landed just as the wait expired.
                return self.try_get().ok_or(BufferError::Timeout(timeout));
            }
        }
    }
}
