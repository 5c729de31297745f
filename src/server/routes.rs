//! HTTP routes
//!
//! - `GET /live?url=<upstream>` relays the upstream stream to the caller
//! - `GET /status` reports every active relay as JSON

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::registry::RelayRegistry;
use crate::session::{RelayConfig, RelayOutput, RelaySession};
use crate::upstream::UpstreamFetcher;

/// Content type of relayed streams
pub const STREAM_CONTENT_TYPE: &str = "video/mp2t";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RelayRegistry>,
    pub fetcher: Arc<dyn UpstreamFetcher>,
    pub relay_config: RelayConfig,
    /// Caps concurrent relays when set
    pub relay_slots: Option<Arc<Semaphore>>,
}

/// Build the relay router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/live", get(live))
        .route("/status", get(status))
        .with_state(state)
}

/// Query string of `/live`
#[derive(Debug, Deserialize)]
pub struct LiveParams {
    pub url: Option<String>,
}

/// `GET /live?url=...`: start a relay and stream it back.
pub async fn live(State(state): State<AppState>, Query(params): Query<LiveParams>) -> Response {
    let Some(source) = params.url.filter(|url| !url.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing 'url' parameter").into_response();
    };

    let permit = match &state.relay_slots {
        Some(slots) => match Arc::clone(slots).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(source = %source, "Relay rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "Too many active relays").into_response();
            }
        },
        None => None,
    };

    let session = RelaySession::start(
        source,
        state.relay_config.clone(),
        Arc::clone(&state.fetcher),
    );

    let output = match open_relay(&state.registry, &session) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(session_id = %session.id(), error = %e, "Failed to start relay");
            session.stop();
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    tracing::info!(
        session_id = %session.id(),
        source = %session.source(),
        "Client connected"
    );

    let body = ClientStream {
        session,
        output,
        registry: Arc::clone(&state.registry),
        _permit: permit,
    };

    (
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(body),
    )
        .into_response()
}

/// `GET /status`: JSON status of all active relays.
pub async fn status(State(state): State<AppState>) -> Response {
    let status = state.registry.status();

    match serde_json::to_string_pretty(&status) {
        Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize status");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Take the session's output and make it visible to `/status`
fn open_relay(
    registry: &RelayRegistry,
    session: &Arc<RelaySession>,
) -> crate::Result<RelayOutput> {
    let output = session.consume()?;
    registry.register(session)?;
    Ok(output)
}

/// Response body of `/live`
///
/// Owns the session. Dropped by hyper when the client disconnects or the
/// relay ends; the session is then unregistered and stopped, and its fetch
/// task is joined in the background.
struct ClientStream {
    session: Arc<RelaySession>,
    output: RelayOutput,
    registry: Arc<RelayRegistry>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Stream for ClientStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.output.poll_next_unpin(cx).map(|chunk| chunk.map(Ok))
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        let session = Arc::clone(&self.session);
        self.registry.unregister(session.id());
        session.stop();

        tracing::info!(
            session_id = %session.id(),
            total_bytes = session.total_bytes(),
            reconnects = session.reconnect_count(),
            "Client disconnected, relay released"
        );

        // Hyper drops bodies on the runtime; without one the task is
        // already gone with it.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            match session.join().await {
                Ok(()) => tracing::debug!(session_id = %session.id(), "Relay task exited"),
                Err(e) => {
                    tracing::warn!(session_id = %session.id(), error = %e, "Relay task failed")
                }
            }
        });
    }
}
