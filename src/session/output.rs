//! Outbound chunk stream of a relay session

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, BoxStream, FusedStream, Stream, StreamExt};

use crate::buffer::{BufferError, BufferItem};

use super::id::SessionId;
use super::relay::Shared;

/// Stops the session when the output goes away, however that happens
struct StopOnDrop(Arc<Shared>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        if self.0.stop() {
            tracing::debug!(session_id = %self.0.id, "Consumer went away");
        }
    }
}

/// Chunks relayed to the client, in upstream order
///
/// Ends when the session is stopped. Dropping it before the end stops the
/// session, which is how a client disconnect releases the upstream side.
pub struct RelayOutput {
    id: SessionId,
    inner: stream::Fuse<BoxStream<'static, Bytes>>,
}

impl RelayOutput {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let id = shared.id;
        let inner = stream::unfold(StopOnDrop(shared), |guard| async move {
            let shared = Arc::clone(&guard.0);
            let wait = shared.config.consume_timeout;

            while shared.is_running() {
                match shared.buffer.get(wait).await {
                    Ok(BufferItem::Data(chunk)) => return Some((chunk, guard)),
                    Ok(BufferItem::EndOfStream) => return None,
                    // Upstream is slow or reconnecting; keep waiting while running.
                    Err(BufferError::Timeout(_)) => {}
                }
            }
            None
        })
        .boxed()
        .fuse();

        Self { id, inner }
    }

    /// ID of the session this output drains
    pub fn session_id(&self) -> SessionId {
        self.id
    }
}

impl Stream for RelayOutput {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl FusedStream for RelayOutput {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl std::fmt::Debug for RelayOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayOutput")
            .field("session_id", &self.id)
            .field("terminated", &self.inner.is_terminated())
            .finish()
    }
}
