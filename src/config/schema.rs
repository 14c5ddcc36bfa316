//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the overlay gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to a route kind.
    pub routes: Vec<RouteConfig>,

    /// Upstream resolution, loop prevention and allow-list.
    pub forwarder: ForwarderConfig,

    /// Response cache.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    /// Hotfix seeding.
    pub hotfixes: HotfixConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// How a matched request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// Relay the upstream response untouched.
    #[default]
    Passthrough,
    /// Merge hotfixes into the upstream body and cache the result.
    Merge,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Passthrough => "passthrough",
            RouteKind::Merge => "merge",
        }
    }
}

/// Route configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    #[serde(default)]
    pub kind: RouteKind,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Cache TTL for merged responses; the cache default when absent.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

/// Forwarder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Upstream used when a request names none.
    pub default_target: Option<String>,

    /// Request header carrying the upstream URL.
    pub target_header: String,

    /// Header marking requests that already went through a gateway.
    pub loop_header: String,

    /// Scheme applied to targets given as a bare host.
    pub default_scheme: String,

    /// Origin patterns (`https://*.example.com`, `http://10.0.0.1:8080`).
    /// Empty denies every destination; `*` allows any.
    pub allowed_origins: Vec<String>,

    /// Follow upstream redirects for passthrough routes.
    pub follow_redirects: bool,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            default_target: None,
            target_header: "x-upstream-url".to_string(),
            loop_header: "x-overlay-hop".to_string(),
            default_scheme: "https".to_string(),
            allowed_origins: Vec::new(),
            follow_redirects: false,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Kill switch.
    pub enabled: bool,

    /// TTL applied when a put names none.
    pub default_ttl_secs: u64,

    /// Entries kept in each partition's in-memory shadow (0 disables it).
    pub shadow_capacity: usize,

    /// Directory for per-partition snapshot files; in-memory when absent.
    pub data_dir: Option<String>,

    /// Request header selecting the partition.
    pub partition_header: String,

    pub default_partition: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: 300,
            shadow_capacity: 1024,
            data_dir: None,
            partition_header: "x-cache-partition".to_string(),
            default_partition: "global".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout of a single upstream hop in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            upstream_secs: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Hotfix configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HotfixConfig {
    /// Override files loaded at startup; the file name is the file id.
    pub seed_files: Vec<String>,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes, inbound and upstream.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.forwarder.target_header, "x-upstream-url");
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_routes_parse_kind() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[routes]]
            name = "ini"
            path_prefix = "/cloudstorage/"
            kind = "merge"
            priority = 10
            cache_ttl_secs = 60

            [[routes]]
            name = "rest"
            "#,
        )
        .unwrap();
        assert_eq!(config.routes[0].kind, RouteKind::Merge);
        assert_eq!(config.routes[0].cache_ttl_secs, Some(60));
        assert_eq!(config.routes[1].kind, RouteKind::Passthrough);
        assert_eq!(config.routes[1].priority, 0);
    }
}
