//! Relay HTTP server
//!
//! Binds the listener and serves the relay routes.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::registry::RelayRegistry;
use crate::server::config::ServerConfig;
use crate::server::routes::{build_router, AppState};
use crate::upstream::{HttpFetcher, UpstreamFetcher};

/// Relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<RelayRegistry>,
    fetcher: Arc<dyn UpstreamFetcher>,
}

impl RelayServer {
    /// Create a server that fetches upstream over HTTP
    pub fn new(config: ServerConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.relay.read_timeout)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create a server with a custom upstream fetcher
    pub fn with_fetcher(config: ServerConfig, fetcher: Arc<dyn UpstreamFetcher>) -> Self {
        Self {
            config,
            registry: Arc::new(RelayRegistry::new()),
            fetcher,
        }
    }

    /// Get a reference to the relay registry
    pub fn registry(&self) -> &Arc<RelayRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the HTTP router for this server
    pub fn router(&self) -> Router {
        let relay_slots = if self.config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(self.config.max_connections)))
        } else {
            None
        };

        build_router(AppState {
            registry: Arc::clone(&self.registry),
            fetcher: Arc::clone(&self.fetcher),
            relay_config: self.config.relay.clone(),
            relay_slots,
        })
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Relay server listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown every relay is stopped so open client streams end and
    /// the server can drain.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        let registry = Arc::clone(&self.registry);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                registry.stop_all();
            })
            .await?;

        Ok(())
    }
}
