//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - No match means passthrough; callers decide via `RouteKind::default()`

use axum::http::{HeaderMap, Uri};

use crate::config::{RouteConfig, RouteKind};
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub kind: RouteKind,
    pub priority: u32,
    pub cache_ttl_secs: Option<u64>,
    matcher: AndMatcher,
}

impl Route {
    fn compile(config: RouteConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = config.host {
            matchers.push(Box::new(HostMatcher::new(host)));
        }
        if let Some(prefix) = config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix)));
        }
        Self {
            name: config.name,
            kind: config.kind,
            priority: config.priority,
            cache_ttl_secs: config.cache_ttl_secs,
            matcher: AndMatcher::new(matchers),
        }
    }
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes, highest priority first. Equal priorities keep
    /// configuration order.
    pub fn from_config(configs: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<Route> = configs.into_iter().map(Route::compile).collect();
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    pub fn match_request(&self, uri: &Uri, headers: &HeaderMap) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(uri, headers))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
