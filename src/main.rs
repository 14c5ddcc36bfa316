//! Overlay gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────────┐
//!                         │                  OVERLAY GATEWAY                  │
//!                         │                                                   │
//!   Client Request        │  ┌────────┐   ┌─────────┐   ┌──────────┐          │
//!   ──────────────────────┼─▶│  gate  │──▶│ routing │──▶│  proxy   │──────────┼──▶ Upstream
//!                         │  └────────┘   └─────────┘   │forwarder │          │
//!                         │      │ hit                  │ + relay  │          │
//!                         │      ▼                      └────┬─────┘          │
//!   Client Response       │  ┌────────┐   ┌─────────┐        │ merge routes   │
//!   ◀─────────────────────┼──│response│◀──│ hotfix  │◀───────┘                │
//!                         │  └────────┘   │  merge  │                         │
//!                         │               └────┬────┘                         │
//!                         │                    ▼                              │
//!                         │  ┌─────────────────────────────────────────────┐  │
//!                         │  │ cache: registry → partition actors          │  │
//!                         │  │        (shadow LRU + durable layer)         │  │
//!                         │  └─────────────────────────────────────────────┘  │
//!                         │                                                   │
//!                         │  admin API ─▶ hotfix store ─▶ invalidation worker │
//!                         └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use overlay_gateway::admin::setup_admin_router;
use overlay_gateway::config::{load_config, GatewayConfig};
use overlay_gateway::lifecycle::{self, Shutdown};
use overlay_gateway::observability::{logging, metrics};
use overlay_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "overlay-gateway")]
#[command(about = "Transparent overlay gateway with override merging and tagged caching", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when absent.
    #[arg(short, long, env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "overlay-gateway starting");
    tracing::info!(
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = lifecycle::build(config).await?;
    let state = gateway.state;
    let shutdown = Shutdown::new();

    let worker = tokio::spawn(gateway.worker.run(shutdown.subscribe()));

    let admin = if state.config.admin.enabled {
        let listener = TcpListener::bind(&state.config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(state.clone());
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    let listener = TcpListener::bind(&state.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    let server = tokio::spawn(HttpServer::new(state).run(listener, shutdown.subscribe()));

    lifecycle::wait_for_signal().await;
    shutdown.trigger();

    server.await??;
    if let Some(admin) = admin {
        admin.await??;
    }
    worker.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
