//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from a validated configuration
//! - Seed the hotfix store
//! - Hand back the shared state plus the background worker to spawn
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in dependency order: cache, hotfixes, forwarder
//! - Listeners are bound by the caller once this returns

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{invalidation, CacheSettings, InvalidationWorker, PartitionRegistry, SystemClock};
use crate::config::GatewayConfig;
use crate::gate::GateStore;
use crate::hotfix::{HotfixStore, HOTFIXES_TABLE};
use crate::http::AppState;
use crate::proxy::{Forwarder, ForwarderSettings, ReqwestUpstream, SettingsError, UpstreamClient};
use crate::routing::Router;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("forwarder settings: {0}")]
    Forwarder(#[from] SettingsError),

    #[error("upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("seed file {path}: {source}")]
    Seed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the binary needs to serve traffic.
pub struct Gateway {
    pub state: AppState,
    pub worker: InvalidationWorker,
}

/// Build the gateway with the reqwest upstream client.
pub async fn build(config: GatewayConfig) -> Result<Gateway, StartupError> {
    let client = ReqwestUpstream::new(
        Duration::from_secs(config.timeouts.connect_secs),
        Duration::from_secs(config.timeouts.upstream_secs),
        config.security.max_body_size,
    )?;
    build_with_client(config, Arc::new(client)).await
}

/// Build the gateway around any upstream client.
pub async fn build_with_client(
    config: GatewayConfig,
    client: Arc<dyn UpstreamClient>,
) -> Result<Gateway, StartupError> {
    // Hotfix edits live in memory, so merges persisted by a previous run
    // cannot be trusted.
    let settings = CacheSettings {
        stale_on_open: vec![HOTFIXES_TABLE.to_string()],
        ..CacheSettings::from(&config.cache)
    };
    let cache = Arc::new(PartitionRegistry::new(settings, Arc::new(SystemClock)));
    let (queue, worker) = invalidation::channel(cache.clone());
    tracing::info!(
        enabled = config.cache.enabled,
        default_ttl_secs = config.cache.default_ttl_secs,
        durable = if config.cache.data_dir.is_some() { "file" } else { "memory" },
        "Cache initialized"
    );

    let hotfixes = Arc::new(HotfixStore::new(Some(queue)));
    for path in &config.hotfixes.seed_files {
        let count = hotfixes
            .import_path(Path::new(path))
            .await
            .map_err(|source| StartupError::Seed {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path, records = count, "Hotfixes seeded");
    }

    let settings = ForwarderSettings::from_config(&config.forwarder)?;
    if settings.allow_list.is_empty() {
        tracing::warn!("forwarder.allowed_origins is empty, every destination will be refused");
    }
    let forwarder = Arc::new(Forwarder::new(settings, client));
    let router = Arc::new(Router::from_config(config.routes.clone()));
    tracing::info!(routes = router.routes().len(), "Routes compiled");

    let state = AppState {
        config: Arc::new(config),
        router,
        forwarder,
        cache,
        hotfixes,
        gate: Arc::new(GateStore::new()),
        started_at: Instant::now(),
    };

    Ok(Gateway { state, worker })
}
