//! hashsync Server Binary
//!
//! Serves an in-memory hash store over TCP.

use std::sync::Arc;

use clap::Parser;
use hashsync::network::Server;
use hashsync::{Config, MemoryStore};
use tracing_subscriber::{fmt, EnvFilter};

/// hashsync Server
#[derive(Parser, Debug)]
#[command(name = "hashsync-server")]
#[command(about = "In-memory hash store for record sync and bounded counters")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Interval between expired-key sweeps, in milliseconds
    #[arg(long, default_value = "1000")]
    purge_interval_ms: u64,

    /// Idle read timeout per connection in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hashsync=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("hashsync server v{}", hashsync::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .purge_interval_ms(args.purge_interval_ms)
        .read_timeout_ms(args.read_timeout_ms)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let server = Server::new(config, Arc::new(MemoryStore::new()));
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
