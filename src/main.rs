use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ts_relay::session::config::{DEFAULT_BUFFER_CAPACITY_BYTES, DEFAULT_CHUNK_SIZE};
use ts_relay::{RelayConfig, RelayServer, ServerConfig};

#[derive(Parser)]
#[command(version, about = "Reconnecting HTTP live-stream relay")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:5000", env = "LISTEN_ADDR")]
    addr: SocketAddr,

    /// Maximum concurrent relays (0 = unlimited)
    #[arg(long, default_value_t = 0, env = "MAX_CONNECTIONS")]
    max_connections: usize,

    /// Per-relay buffer budget in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY_BYTES, env = "BUFFER_BYTES")]
    buffer_bytes: usize,

    /// Bytes per upstream read
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, env = "CHUNK_SIZE")]
    chunk_size: usize,

    /// Seconds to wait before reconnecting to upstream
    #[arg(long, default_value_t = 1, env = "RETRY_DELAY_SECS")]
    retry_delay_secs: u64,

    /// Upstream connect/read timeout in seconds
    #[arg(long, default_value_t = 10, env = "READ_TIMEOUT_SECS")]
    read_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ts_relay=info")),
        )
        .init();

    let relay = RelayConfig::default()
        .buffer_capacity_bytes(args.buffer_bytes)
        .chunk_size(args.chunk_size)
        .retry_delay(Duration::from_secs(args.retry_delay_secs))
        .read_timeout(Duration::from_secs(args.read_timeout_secs));

    let config = ServerConfig::with_addr(args.addr)
        .max_connections(args.max_connections)
        .relay(relay);

    tracing::info!(
        addr = %config.bind_addr,
        chunk_size = config.relay.chunk_size,
        buffer_chunks = config.relay.buffer_chunks(),
        "Starting relay server"
    );

    let server = RelayServer::new(config)?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
