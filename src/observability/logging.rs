//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level when set. `json` switches the
//! formatter to one JSON object per event; anything else is the default
//! human-readable format.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let fmt_layer = if config.log_format.eq_ignore_ascii_case("json") {
        fmt::layer().json().with_current_span(true).with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}

fn default_directives(level: &str) -> String {
    format!("overlay_gateway={level},tower_http={level},info")
}
