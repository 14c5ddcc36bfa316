//! Route matching logic.
//!
//! # Design Decisions
//! - Host matching is case-insensitive; a configured host without a port
//!   matches any port
//! - Path matching is a case-sensitive prefix test
//! - Empty condition list = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use axum::http::{header, HeaderMap, Uri};

/// Trait for matching request heads against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, uri: &Uri, headers: &HeaderMap) -> bool;
}

/// Matches the Host header (falling back to the URI authority).
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
    with_port: bool,
}

impl HostMatcher {
    pub fn new(host: impl Into<String>) -> Self {
        let expected_host = host.into().to_lowercase();
        let with_port = expected_host.contains(':');
        Self {
            expected_host,
            with_port,
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()));
        let Some(host) = host else {
            return false;
        };
        let host = host.to_lowercase();
        let host = if self.with_port {
            host.as_str()
        } else {
            host.split(':').next().unwrap_or_default()
        };
        host == self.expected_host
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, uri: &Uri, _headers: &HeaderMap) -> bool {
        uri.path().starts_with(&self.prefix)
    }
}

/// All inner matchers must pass.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        self.matchers.iter().all(|m| m.matches(uri, headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn host(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("example.com");
        let uri = Uri::from_static("/");

        assert!(matcher.matches(&uri, &host("example.com")));
        assert!(matcher.matches(&uri, &host("EXAMPLE.COM")));
        assert!(matcher.matches(&uri, &host("example.com:8080")));
        assert!(!matcher.matches(&uri, &host("other.com")));
        assert!(!matcher.matches(&uri, &HeaderMap::new()));
    }

    #[test]
    fn test_host_matcher_with_port() {
        let matcher = HostMatcher::new("example.com:8080");
        let uri = Uri::from_static("/");
        assert!(matcher.matches(&uri, &host("example.com:8080")));
        assert!(!matcher.matches(&uri, &host("example.com")));
    }

    #[test]
    fn test_host_from_absolute_uri() {
        let matcher = HostMatcher::new("example.com");
        assert!(matcher.matches(&Uri::from_static("http://example.com/x"), &HeaderMap::new()));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        let headers = HeaderMap::new();
        assert!(matcher.matches(&Uri::from_static("http://example.com/api/v1"), &headers));
        assert!(!matcher.matches(&Uri::from_static("http://example.com/images"), &headers));
    }

    #[test]
    fn test_empty_and_matches_everything() {
        let matcher = AndMatcher::new(Vec::new());
        assert!(matcher.matches(&Uri::from_static("/anything"), &HeaderMap::new()));
    }
}
