use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use ts_relay::{RelayConfig, RelayServer, RelayState, ServerConfig};

const CHUNK: usize = 8192;

fn pattern(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

/// Local upstream: `/three` serves three chunks then closes, `/missing` is a 404.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/three", get(|| async { pattern(3 * CHUNK) }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn relay_server(max_connections: usize) -> RelayServer {
    let relay = RelayConfig::default()
        .chunk_size(CHUNK)
        .retry_delay(Duration::from_millis(20))
        .read_timeout(Duration::from_secs(2))
        .consume_timeout(Duration::from_millis(100));
    let config = ServerConfig::default()
        .max_connections(max_connections)
        .relay(relay);

    RelayServer::new(config).unwrap()
}

async fn get_response(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&body).into_owned()
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn live_without_url_is_bad_request() {
    let server = relay_server(0);
    let app = server.router();

    let response = get_response(&app, "/live").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Missing 'url' parameter");

    let response = get_response(&app, "/live?url=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.registry().is_empty());
}

#[tokio::test]
async fn live_relays_upstream_bytes_and_cleans_up() {
    let upstream = spawn_upstream().await;
    let server = relay_server(0);
    let app = server.router();

    let response = get_response(&app, &format!("/live?url=http://{upstream}/three")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp2t");
    assert_eq!(server.registry().len(), 1);
    let session = server.registry().snapshot().remove(0);

    let mut body = response.into_body().into_data_stream();
    let mut received = Vec::new();
    while received.len() < 3 * CHUNK {
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("relay stalled")
            .expect("relay ended early")
            .unwrap();
        assert!(chunk.len() <= CHUNK);
        received.extend_from_slice(&chunk);
    }
    assert_eq!(&received[..3 * CHUNK], &pattern(3 * CHUNK)[..]);

    // Upstream closed after three chunks, so the relay reconnects.
    wait_until("reconnect", || session.reconnect_count() >= 1).await;
    assert!(session.total_bytes() >= (3 * CHUNK) as u64);
    assert!(session.is_running());

    drop(body);

    assert!(server.registry().is_empty());
    assert!(!session.is_running());
    tokio::time::timeout(Duration::from_secs(2), session.join())
        .await
        .expect("fetch task did not exit")
        .unwrap();
    assert_eq!(session.state(), RelayState::Stopped);
}

#[tokio::test]
async fn client_disconnect_joins_relay_task() {
    let upstream = spawn_upstream().await;
    let server = relay_server(0);
    let app = server.router();

    let response = get_response(&app, &format!("/live?url=http://{upstream}/missing")).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The response body owns the session; the registry only refers to it.
    let session = Arc::downgrade(&server.registry().snapshot().remove(0));
    assert!(session.upgrade().is_some());

    drop(response);

    assert!(server.registry().is_empty());
    // Released only once the background join has seen the fetch task exit.
    wait_until("relay task joined", || session.upgrade().is_none()).await;
}

#[tokio::test]
async fn status_reports_reconnecting_relay() {
    let upstream = spawn_upstream().await;
    let server = relay_server(0);
    let app = server.router();

    let live = get_response(&app, &format!("/live?url=http://{upstream}/missing")).await;
    assert_eq!(live.status(), StatusCode::OK);
    let session = server.registry().snapshot().remove(0);
    wait_until("reconnect", || session.reconnect_count() >= 2).await;

    let response = get_response(&app, "/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["active_connections"], 1);
    let stream = &json["streams"][0];
    assert_eq!(stream["id"], session.id().to_string());
    assert_eq!(stream["url"], format!("http://{upstream}/missing"));
    assert_ne!(stream["state"], "STREAMING");
    assert!(stream["reconnect_count"].as_u64().unwrap() >= 2);
    assert_eq!(stream["total_mb"], 0.0);
    assert_eq!(stream["buffer_usage_percent"], 0.0);

    drop(live);
    let json: serde_json::Value =
        serde_json::from_str(&body_text(get_response(&app, "/status").await).await).unwrap();
    assert_eq!(json["active_connections"], 0);
    assert_eq!(json["streams"], serde_json::json!([]));
}

#[tokio::test]
async fn connection_limit_rejects_extra_relays() {
    let upstream = spawn_upstream().await;
    let server = relay_server(1);
    let app = server.router();
    let uri = format!("/live?url=http://{upstream}/missing");

    let first = get_response(&app, &uri).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = get_response(&app, &uri).await;
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(server.registry().len(), 1);

    drop(first);
    let third = get_response(&app, &uri).await;
    assert_eq!(third.status(), StatusCode::OK);
}

#[tokio::test]
async fn serve_until_stops_relays_on_shutdown() {
    let upstream = spawn_upstream().await;
    let server = Arc::new(relay_server(0));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            server
                .serve_until(listener, async {
                    let _ = shutdown_rx.await;
                })
                .await
        })
    };

    let client = reqwest::Client::new();
    let mut live = client
        .get(format!("http://{addr}/live?url=http://{upstream}/three"))
        .send()
        .await
        .unwrap();
    assert_eq!(live.status(), reqwest::StatusCode::OK);
    let first = live.chunk().await.unwrap().unwrap();
    assert!(!first.is_empty());

    let status = client
        .get(format!("http://{addr}/status"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let status: serde_json::Value = serde_json::from_str(&status).unwrap();
    assert_eq!(status["active_connections"], 1);
    let session = server.registry().snapshot().remove(0);

    shutdown_tx.send(()).unwrap();
    while let Ok(Some(_)) = live.chunk().await {}

    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server did not shut down")
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(2), session.join())
        .await
        .expect("fetch task did not exit")
        .unwrap();
    assert_eq!(session.state(), RelayState::Stopped);
}
