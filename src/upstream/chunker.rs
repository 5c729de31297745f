//! Fixed-size re-chunking of upstream bodies

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use super::{ChunkStream, UpstreamError};

struct Chunker<S> {
    inner: S,
    pending: BytesMut,
    error: Option<UpstreamError>,
    done: bool,
}

/// Regroup an arbitrary byte stream into `chunk_size` pieces
///
/// Every piece is exactly `chunk_size` bytes except the last one before the
/// inner stream ends or fails, which carries whatever was left. An inner
/// error is yielded after the leftover bytes and ends the stream.
pub fn rechunk<S>(inner: S, chunk_size: usize) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, UpstreamError>> + Send + 'static,
{
    let chunk_size = chunk_size.max(1);
    let state = Chunker {
        inner: Box::pin(inner),
        pending: BytesMut::with_capacity(chunk_size),
        error: None,
        done: false,
    };

    stream::unfold(state, move |mut state| async move {
        loop {
            if state.pending.len() >= chunk_size {
                let chunk = state.pending.split_to(chunk_size).freeze();
                return Some((Ok(chunk), state));
            }

            if state.done {
                if !state.pending.is_empty() {
                    let chunk = state.pending.split().freeze();
                    return Some((Ok(chunk), state));
                }
                let error = state.error.take()?;
                return Some((Err(error), state));
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => state.pending.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.error = Some(e);
                    state.done = true;
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}
