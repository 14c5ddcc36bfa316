//! Standalone redirect-following relay.
//!
//! Clients send the full destination URL in the target header
//! (`x-upstream-url` by default). The relay forwards the request verbatim,
//! follows redirects itself and answers with the final response.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use overlay_gateway::config::{load_config, GatewayConfig};
use overlay_gateway::http::relay_router;
use overlay_gateway::lifecycle::{self, Shutdown};
use overlay_gateway::observability::logging;
use overlay_gateway::proxy::{Forwarder, ForwarderSettings, ReqwestUpstream};

#[derive(Parser)]
#[command(name = "overlay-relay")]
#[command(about = "Redirect-following relay for explicitly targeted requests", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; forwarder, timeout and logging
    /// settings are read from it.
    #[arg(short, long, env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "OVERLAY_RELAY_BIND", default_value = "0.0.0.0:8787")]
    bind: String,

    /// Origin patterns the relay may reach (repeatable); replaces the
    /// configured list when given.
    #[arg(long = "allow")]
    allow: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if !cli.allow.is_empty() {
        config.forwarder.allowed_origins = cli.allow.clone();
    }
    // Only explicitly targeted requests are relayed.
    config.forwarder.default_target = None;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "overlay-relay starting");

    let client = ReqwestUpstream::new(
        Duration::from_secs(config.timeouts.connect_secs),
        Duration::from_secs(config.timeouts.upstream_secs),
        config.security.max_body_size,
    )?;
    let forwarder = Arc::new(Forwarder::new(
        ForwarderSettings::from_config(&config.forwarder)?,
        Arc::new(client),
    ));
    tracing::info!(
        target_header = %config.forwarder.target_header,
        allowed_origins = config.forwarder.allowed_origins.len(),
        "Relay configured"
    );

    let router = relay_router(forwarder, config.security.max_body_size);
    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Relay listening");

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await
    });

    lifecycle::wait_for_signal().await;
    shutdown.trigger();
    server.await??;

    tracing::info!("Relay stopped");
    Ok(())
}
