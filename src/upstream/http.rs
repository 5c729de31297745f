//! HTTP upstream fetcher backed by reqwest

use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};

use super::{rechunk, ChunkStream, FetchRequest, UpstreamError, UpstreamFetcher};

/// Fetches upstream streams over HTTP(S)
///
/// A single connection pool is shared by all sessions using this fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose TCP/TLS connect phase is bounded by `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self { client })
    }

}

impl UpstreamFetcher for HttpFetcher {
    fn open(
        &self,
        request: FetchRequest,
    ) -> BoxFuture<'static, Result<ChunkStream, UpstreamError>> {
        let client = self.client.clone();

        async move {
            let response = client.get(&request.source).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(UpstreamError::Status(status));
            }

            tracing::debug!(
                source = %request.source,
                status = status.as_u16(),
                content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
                "Upstream responded"
            );

            let body = response.bytes_stream().map_err(UpstreamError::from);
            Ok(rechunk(body, request.chunk_size))
        }
        .boxed()
    }
}
