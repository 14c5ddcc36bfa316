//! Destination allow-list.
//!
//! Patterns name an origin, optionally with a scheme and port:
//! `example.com`, `*.example.com`, `https://api.example.com`,
//! `http://10.0.0.1:8080`, `*`. A pattern without a scheme matches http and
//! https; without a port it matches any port. `*.` matches subdomains only.
//!
//! An empty list denies every destination; `*` must be listed explicitly to
//! allow any origin.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    Exact(String),
    /// Stored with its leading dot, e.g. `.example.com`.
    Suffix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPattern {
    scheme: Option<String>,
    host: HostPattern,
    port: Option<u16>,
}

impl OriginPattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern.chars().any(char::is_whitespace) {
            return Err(format!("invalid origin pattern '{pattern}'"));
        }

        let (scheme, rest) = match pattern.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = scheme.to_ascii_lowercase();
                if scheme != "http" && scheme != "https" {
                    return Err(format!("unsupported scheme in '{pattern}'"));
                }
                (Some(scheme), rest)
            }
            None => (None, pattern),
        };
        let rest = rest.trim_end_matches('/');
        if rest.contains('/') {
            return Err(format!("origin pattern '{pattern}' must not contain a path"));
        }

        let parse_port = |port: &str| {
            port.parse::<u16>()
                .map_err(|_| format!("invalid port in '{pattern}'"))
        };
        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (inner, after) = bracketed
                .split_once(']')
                .ok_or_else(|| format!("unterminated IPv6 host in '{pattern}'"))?;
            let port = match after.strip_prefix(':') {
                Some(port) => Some(parse_port(port)?),
                None if after.is_empty() => None,
                None => return Err(format!("invalid origin pattern '{pattern}'")),
            };
            (format!("[{inner}]"), port)
        } else {
            match rest.split_once(':') {
                Some((host, port)) => (host.to_string(), Some(parse_port(port)?)),
                None => (rest.to_string(), None),
            }
        };

        let host = host.to_ascii_lowercase();
        let host = if host == "*" {
            HostPattern::Any
        } else if let Some(suffix) = host.strip_prefix("*.") {
            if suffix.is_empty() || suffix.contains('*') {
                return Err(format!("invalid wildcard in '{pattern}'"));
            }
            HostPattern::Suffix(format!(".{suffix}"))
        } else if host.is_empty() || host.contains('*') {
            return Err(format!("invalid host in '{pattern}'"));
        } else {
            HostPattern::Exact(host)
        };

        Ok(Self { scheme, host, port })
    }

    pub fn matches(&self, url: &Url) -> bool {
        if let Some(scheme) = &self.scheme {
            if url.scheme() != scheme {
                return false;
            }
        }
        if let Some(port) = self.port {
            if url.port_or_known_default() != Some(port) {
                return false;
            }
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        match &self.host {
            HostPattern::Any => true,
            HostPattern::Exact(expected) => host == *expected,
            HostPattern::Suffix(suffix) => host.ends_with(suffix.as_str()),
        }
    }
}

/// Fixed set of destination patterns. An empty list denies everything.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    patterns: Vec<OriginPattern>,
}

impl AllowList {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, String> {
        let patterns = patterns
            .iter()
            .map(|p| OriginPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn allows(&self, url: &Url) -> bool {
        self.patterns.iter().any(|p| p.matches(url))
    }
}
