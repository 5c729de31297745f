//! Relay session
//!
//! A session owns one background fetch task and one [`ChunkBuffer`]. The
//! task connects to upstream, copies chunks into the buffer, and reconnects
//! forever on any failure until the session is stopped:
//!
//! ```text
//!   UpstreamFetcher ──open()──► fetch task ──put()──► ChunkBuffer
//!                                   ▲                     │
//!                         stop() ───┤                  get()
//!                                   │                     ▼
//!                              RelaySession ──consume()──► RelayOutput ──► client
//! ```
//!
//! Every await point of the fetch task races the stop signal, so a stopped
//! session exits without waiting out a timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::buffer::ChunkBuffer;
use crate::error::{Error, Result};
use crate::stats::{bytes_to_mb, RelayStatus};
use crate::upstream::{FetchRequest, UpstreamError, UpstreamFetcher};

use super::config::RelayConfig;
use super::id::SessionId;
use super::output::RelayOutput;
use super::state::{RelayState, StateCell};

/// State shared between the session handle, its fetch task and its output
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: SessionId,
    pub(crate) source: String,
    pub(crate) config: RelayConfig,
    pub(crate) buffer: ChunkBuffer,
    /// `true` until stop is requested; never set back
    running: watch::Sender<bool>,
    state: StateCell,
    started_at: Instant,
    /// Milliseconds after `started_at` of the last buffered chunk
    last_active_ms: AtomicU64,
    reconnect_count: AtomicU64,
    total_bytes: AtomicU64,
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Request stop; returns `true` for the call that actually stopped
    pub(crate) fn stop(&self) -> bool {
        let was_running = self.running.send_replace(false);
        if was_running {
            self.buffer.put_end_of_stream();
            tracing::debug!(session_id = %self.id, "Stop requested");
        }
        was_running
    }

    /// Resolve once stop has been requested
    async fn stopped(&self) {
        let mut running = self.running.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = running.wait_for(|running| !running).await;
    }

    fn touch(&self) {
        let elapsed = self.started_at.elapsed().as_millis() as u64;
        self.last_active_ms.store(elapsed, Ordering::Relaxed);
    }
}

/// Outcome of one upstream connection attempt
enum Attempt {
    /// Stop observed; do not retry
    Stopped,
    /// Attempt ended with an error; retry after the delay
    Failed(UpstreamError),
}

/// One relay from an upstream source to a single client
///
/// Created with [`RelaySession::start`], which spawns the fetch task on the
/// current tokio runtime. The session owns that task; [`join`] waits for it
/// to exit. Dropping the handle stops the session.
///
/// [`join`]: RelaySession::join
#[derive(Debug)]
pub struct RelaySession {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    consumed: AtomicBool,
}

impl RelaySession {
    /// Create a session for `source` and start its fetch task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        source: impl Into<String>,
        config: RelayConfig,
        fetcher: Arc<dyn UpstreamFetcher>,
    ) -> Arc<Self> {
        let (running, _) = watch::channel(true);
        let shared = Arc::new(Shared {
            id: SessionId::next(),
            source: source.into(),
            buffer: ChunkBuffer::new(config.buffer_chunks()),
            config,
            running,
            state: StateCell::new(),
            started_at: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            reconnect_count: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        });

        let task = tokio::spawn(fetch_loop(Arc::clone(&shared), fetcher));

        Arc::new(Self {
            shared,
            task: Mutex::new(Some(task)),
            consumed: AtomicBool::new(false),
        })
    }

    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Get the upstream address
    pub fn source(&self) -> &str {
        &self.shared.source
    }

    /// Get the session configuration
    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Get the current state
    pub fn state(&self) -> RelayState {
        self.shared.state.load()
    }

    /// Check if stop has not been requested yet
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Number of failed upstream attempts
    pub fn reconnect_count(&self) -> u64 {
        self.shared.reconnect_count.load(Ordering::Relaxed)
    }

    /// Bytes fetched from upstream and buffered
    pub fn total_bytes(&self) -> u64 {
        self.shared.total_bytes.load(Ordering::Relaxed)
    }

    /// Request the session to stop
    ///
    /// Idempotent. Wakes a client blocked on the buffer; the fetch task exits
    /// at its next await point.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Take the outbound chunk stream
    ///
    /// The stream ends when the session stops, and dropping it stops the
    /// session. A session has a single consumer; later calls fail.
    pub fn consume(&self) -> Result<RelayOutput> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyConsumed(self.id()));
        }
        Ok(RelayOutput::new(Arc::clone(&self.shared)))
    }

    /// Snapshot of the session counters
    pub fn status(&self) -> RelayStatus {
        let shared = &self.shared;
        let elapsed = shared.started_at.elapsed();
        let last_active_ms = shared.last_active_ms.load(Ordering::Relaxed);
        let idle_ms = (elapsed.as_millis() as u64).saturating_sub(last_active_ms);
        let total_bytes = self.total_bytes();

        RelayStatus {
            id: shared.id,
            source: shared.source.clone(),
            state: self.state(),
            uptime_seconds: elapsed.as_secs(),
            reconnect_count: self.reconnect_count(),
            buffer_usage_percent: shared.buffer.usage_percent(),
            total_bytes,
            total_mb: bytes_to_mb(total_bytes),
            last_active_ago_seconds: idle_ms / 1000,
        }
    }

    /// Wait for the fetch task to exit
    ///
    /// Concurrent callers all wait for the exit. A task failure is reported
    /// to the caller that observed it; later calls return `Ok`.
    pub async fn join(&self) -> Result<()> {
        let mut task = self.task.lock().await;

        let Some(handle) = task.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        *task = None;

        result.map_err(|source| Error::Task {
            id: self.id(),
            source,
        })
    }

    /// Check if the fetch task has exited and been joined, or exited on its own
    ///
    /// Returns `false` while a [`join`](RelaySession::join) is in progress.
    pub fn is_finished(&self) -> bool {
        match self.task.try_lock() {
            Ok(task) => task.as_ref().map_or(true, JoinHandle::is_finished),
            Err(_) => false,
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

async fn fetch_loop(shared: Arc<Shared>, fetcher: Arc<dyn UpstreamFetcher>) {
    tracing::info!(
        session_id = %shared.id,
        source = %shared.source,
        buffer_chunks = shared.buffer.capacity(),
        "Relay started"
    );

    while shared.is_running() {
        shared.state.transition(RelayState::Connecting);

        let error = match relay_once(&shared, fetcher.as_ref()).await {
            Attempt::Stopped => break,
            Attempt::Failed(error) => error,
        };

        if !shared.is_running() {
            break;
        }

        let attempt = shared.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
        shared.state.transition(RelayState::Reconnecting);

        tracing::debug!(
            session_id = %shared.id,
            attempt = attempt,
            error = %error,
            retry_delay_ms = shared.config.retry_delay.as_millis() as u64,
            "Upstream interrupted, reconnecting"
        );

        tokio::select! {
            _ = tokio::time::sleep(shared.config.retry_delay) => {}
            _ = shared.stopped() => break,
        }
    }

    shared.state.transition(RelayState::Stopped);

    tracing::info!(
        session_id = %shared.id,
        reconnects = shared.reconnect_count.load(Ordering::Relaxed),
        total_bytes = shared.total_bytes.load(Ordering::Relaxed),
        "Relay stopped"
    );
}

/// Connect once and copy chunks until the connection fails or stop is requested
async fn relay_once(shared: &Shared, fetcher: &dyn UpstreamFetcher) -> Attempt {
    let read_timeout = shared.config.read_timeout;
    let request = FetchRequest::new(shared.source.clone(), shared.config.chunk_size);

    let opened = tokio::select! {
        opened = tokio::time::timeout(read_timeout, fetcher.open(request)) => opened,
        _ = shared.stopped() => return Attempt::Stopped,
    };

    let mut chunks = match opened {
        Ok(Ok(chunks)) => chunks,
        Ok(Err(e)) => return Attempt::Failed(e),
        Err(_) => return Attempt::Failed(UpstreamError::Timeout(read_timeout)),
    };

    if !shared.is_running() {
        return Attempt::Stopped;
    }

    shared.state.transition(RelayState::Streaming);
    tracing::info!(session_id = %shared.id, source = %shared.source, "Upstream connected");

    loop {
        let next = tokio::select! {
            next = tokio::time::timeout(read_timeout, chunks.next()) => next,
            _ = shared.stopped() => return Attempt::Stopped,
        };

        let chunk = match next {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => return Attempt::Failed(e),
            Ok(None) => return Attempt::Failed(UpstreamError::Closed),
            Err(_) => return Attempt::Failed(UpstreamError::Timeout(read_timeout)),
        };

        // Chunks that arrive after stop are dropped.
        if !shared.is_running() {
            return Attempt::Stopped;
        }
        if chunk.is_empty() {
            continue;
        }

        let len = chunk.len() as u64;
        tokio::select! {
            _ = shared.buffer.put(chunk) => {}
            _ = shared.stopped() => return Attempt::Stopped,
        }

        shared.total_bytes.fetch_add(len, Ordering::Relaxed);
        shared.touch();
    }
}
