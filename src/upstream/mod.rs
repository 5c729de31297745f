//! Upstream fetch capability
//!
//! The relay session does not talk HTTP itself. It asks an
//! [`UpstreamFetcher`] to open the source and gets back a stream of byte
//! chunks. Any error, including a clean end of the stream, makes the session
//! reconnect.
//!
//! [`HttpFetcher`] is the production implementation; tests inject scripted
//! fetchers.

pub mod chunker;
pub mod http;

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

pub use chunker::rechunk;
pub use http::HttpFetcher;

/// Stream of upstream chunks produced by a successful open
pub type ChunkStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Parameters for one upstream connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Upstream address (e.g. `http://host/stream.ts`)
    pub source: String,
    /// Size of the chunks the stream should yield
    pub chunk_size: usize,
}

impl FetchRequest {
    /// Create a new fetch request
    pub fn new(source: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            source: source.into(),
            chunk_size,
        }
    }
}

/// Error raised while connecting to or reading from upstream
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Transport failure (DNS, refused connection, reset, TLS, body read)
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    /// No response or no data within the read timeout
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream closed the stream
    #[error("upstream closed the stream")]
    Closed,
}

/// Opens upstream connections for relay sessions
///
/// Implementations must be cheap to share: one instance serves every
/// session in the process.
pub trait UpstreamFetcher: Send + Sync + 'static {
    /// Connect to `request.source` and return its body as a chunk stream
    ///
    /// Resolving to `Ok` means the connection is established and the
    /// response status is acceptable.
    fn open(
        &self,
        request: FetchRequest,
    ) -> BoxFuture<'static, Result<ChunkStream, UpstreamError>>;
}
