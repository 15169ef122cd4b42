//! Edge Gateway
//!
//! The edge tier of the platform: accepts all inbound HTTP and persistent
//! connections, routes them to backend services, and protects the platform
//! from cascading failure.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                  EDGE GATEWAY                     │
//!                    │                                                   │
//!   HTTP request ────┼─▶ rate limit ─▶ validate ─▶ route ─▶ cache ──┐   │
//!                    │                                              ▼   │
//!                    │      registry ─▶ circuit breaker ─▶ balancer     │
//!                    │                        │                         │
//!                    │                        ▼                         │
//!   HTTP response ◀──┼──────────── proxy (timeout/retry) ◀──────────────┼── backends
//!                    │                                                   │
//!   WS connect ──────┼─▶ ws gateway ─▶ backend WS (1:1, rooms, buffer)  │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_gateway::config::loader::load_config;
use edge_gateway::{GatewayConfig, HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "edge-gateway", about = "Routing and resilience edge tier")]
struct Args {
    /// Path to a TOML configuration file; defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edge_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("edge-gateway v0.1.0 starting");

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => edge_gateway::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = std::sync::Arc::new(Shutdown::new());
    let server = HttpServer::new(config);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
