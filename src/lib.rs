//! Overlay gateway library.
//!
//! A transparent gateway in front of an upstream HTTP service: it forwards
//! requests with loop prevention and destination allow-listing, merges
//! locally administered overrides into upstream configuration files, and
//! caches merged results with tag-based invalidation.

pub mod admin;
pub mod cache;
pub mod config;
pub mod gate;
pub mod hotfix;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
