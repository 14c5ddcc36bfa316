//! Upstream forwarding.
//!
//! # Responsibilities
//! - Resolve the destination (explicit option, target header, default)
//! - Reject loops and disallowed destinations before any network call
//! - Build the outbound request and classify the upstream answer
//!
//! # Design Decisions
//! - One attempt per hop, no retries
//! - 2xx, 304 and unfollowed redirects are successes; everything else is an
//!   `UpstreamError` carrying the upstream status and headers

use std::sync::Arc;

use axum::http::{
    header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
};
use bytes::Bytes;
use url::Url;

use crate::config::ForwarderConfig;
use crate::observability::metrics;
use crate::proxy::allow_list::AllowList;
use crate::proxy::error::ForwardError;
use crate::proxy::relay::{is_redirect, RedirectRelay};
use crate::proxy::upstream::{UpstreamClient, UpstreamRequest, UpstreamResponse};
use crate::security::headers::strip_hop_by_hop;

/// Value of the loop marker header on outbound hops.
const LOOP_MARKER: &str = "1";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid header name '{0}'")]
    Header(String),

    #[error("invalid allow-list: {0}")]
    AllowList(String),
}

/// Immutable forwarding policy, built once at startup.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub target_header: HeaderName,
    pub loop_header: HeaderName,
    pub default_target: Option<String>,
    pub default_scheme: String,
    pub allow_list: AllowList,
}

impl ForwarderSettings {
    pub fn from_config(config: &ForwarderConfig) -> Result<Self, SettingsError> {
        let header = |name: &str| {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| SettingsError::Header(name.to_string()))
        };
        Ok(Self {
            target_header: header(config.target_header.as_str())?,
            loop_header: header(config.loop_header.as_str())?,
            default_target: config.default_target.clone(),
            default_scheme: config.default_scheme.clone(),
            allow_list: AllowList::from_patterns(&config.allowed_origins)
                .map_err(SettingsError::AllowList)?,
        })
    }
}

/// Buffered inbound request as seen by the forwarder.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }
    }

    /// `Host` header, else the URI authority.
    pub fn host(&self) -> Option<String> {
        self.headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.uri.authority().map(|a| a.to_string()))
    }

    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
    }
}

/// Path rewrite applied to `path?query` before it is joined to the target.
pub type RewritePath = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Per-call knobs.
#[derive(Clone, Default)]
pub struct ForwardOptions {
    /// Destination; overrides the target header and the default.
    pub target: Option<String>,
    pub rewrite_path: Option<RewritePath>,
    /// Set on the outbound request after the inbound headers are copied.
    pub add_headers: Vec<(HeaderName, HeaderValue)>,
    /// Use the target URL verbatim instead of joining the inbound path.
    pub exact_target: bool,
    pub follow_redirects: bool,
}

pub struct Forwarder {
    settings: ForwarderSettings,
    client: Arc<dyn UpstreamClient>,
}

impl Forwarder {
    pub fn new(settings: ForwarderSettings, client: Arc<dyn UpstreamClient>) -> Self {
        Self { settings, client }
    }

    pub fn settings(&self) -> &ForwarderSettings {
        &self.settings
    }

    /// Resolve and vet the destination. No network traffic happens here.
    pub fn preflight(
        &self,
        inbound: &InboundRequest,
        options: &ForwardOptions,
    ) -> Result<Url, ForwardError> {
        if inbound.headers.contains_key(&self.settings.loop_header) {
            return Err(ForwardError::Recursion(format!(
                "request already carries {}",
                self.settings.loop_header
            )));
        }

        let raw = match &options.target {
            Some(target) => Some(target.clone()),
            None => match inbound.headers.get(&self.settings.target_header) {
                Some(value) => Some(
                    value
                        .to_str()
                        .map_err(|_| ForwardError::BadRequest("target header is not valid text".into()))?
                        .to_string(),
                ),
                None => self.settings.default_target.clone(),
            },
        };
        let raw = raw
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ForwardError::NoTarget)?;

        let target = self.target_url(&raw)?;

        if let Some(host) = inbound.host() {
            if authority(&target).eq_ignore_ascii_case(host.trim()) {
                return Err(ForwardError::Recursion(format!(
                    "target {} points back at this gateway",
                    target.origin().ascii_serialization()
                )));
            }
        }

        if !self.settings.allow_list.allows(&target) {
            return Err(ForwardError::NotAllowed(target.origin().ascii_serialization()));
        }

        Ok(target)
    }

    /// Preflight, then the full outbound URL.
    pub fn resolve(
        &self,
        inbound: &InboundRequest,
        options: &ForwardOptions,
    ) -> Result<Url, ForwardError> {
        let target = self.preflight(inbound, options)?;
        self.build_url(&target, inbound, options)
    }

    /// Forward `inbound` and classify the answer.
    pub async fn forward(
        &self,
        inbound: &InboundRequest,
        options: &ForwardOptions,
    ) -> Result<UpstreamResponse, ForwardError> {
        let result = self.forward_inner(inbound, options).await;
        if let Err(e) = &result {
            metrics::record_forward_error(e.name());
        }
        result
    }

    async fn forward_inner(
        &self,
        inbound: &InboundRequest,
        options: &ForwardOptions,
    ) -> Result<UpstreamResponse, ForwardError> {
        let url = self.resolve(inbound, options)?;
        let headers = self.build_headers(inbound, options);
        let body = (!matches!(inbound.method, Method::GET | Method::HEAD))
            .then(|| inbound.body.clone());

        tracing::debug!(method = %inbound.method, url = %url, "Forwarding upstream");

        let request = UpstreamRequest {
            method: inbound.method.clone(),
            url,
            headers,
            body,
        };

        let response = if options.follow_redirects {
            RedirectRelay::new(self.client.as_ref())
                .with_allow_list(&self.settings.allow_list)
                .send(request)
                .await?
        } else {
            self.client.send(request).await.map_err(|e| {
                tracing::warn!(error = %e, "Upstream transport failure");
                ForwardError::from(e)
            })?
        };

        classify(response)
    }

    fn target_url(&self, raw: &str) -> Result<Url, ForwardError> {
        parse_target(raw, &self.settings.default_scheme).map_err(ForwardError::BadRequest)
    }

    fn build_url(
        &self,
        target: &Url,
        inbound: &InboundRequest,
        options: &ForwardOptions,
    ) -> Result<Url, ForwardError> {
        if options.exact_target {
            return Ok(target.clone());
        }
        let path = inbound.path_and_query();
        let path = match &options.rewrite_path {
            Some(rewrite) => rewrite(path),
            None => path.to_string(),
        };

        // Path and query are set on the target rather than joined, so an
        // inbound `//host/..` can never replace the destination authority.
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path.as_str(), None),
        };
        let mut url = target.clone();
        if path.starts_with('/') {
            url.set_path(path);
        } else {
            url.set_path(&format!("/{path}"));
        }
        url.set_query(query);
        url.set_fragment(None);

        if url.origin() != target.origin() || !self.settings.allow_list.allows(&url) {
            return Err(ForwardError::NotAllowed(url.origin().ascii_serialization()));
        }
        Ok(url)
    }

    fn build_headers(&self, inbound: &InboundRequest, options: &ForwardOptions) -> HeaderMap {
        let mut headers = inbound.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(&self.settings.target_header);
        headers.insert(
            self.settings.loop_header.clone(),
            HeaderValue::from_static(LOOP_MARKER),
        );
        for (name, value) in &options.add_headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }
}

fn classify(response: UpstreamResponse) -> Result<UpstreamResponse, ForwardError> {
    let status = response.status;
    if status.is_success() || status == StatusCode::NOT_MODIFIED || is_redirect(status) {
        return Ok(response);
    }
    tracing::warn!(status = %status, "Upstream returned an error status");
    Err(ForwardError::UpstreamError {
        status,
        headers: response.headers,
        body: response.body,
    })
}

/// Parse a destination. Bare hosts (`upstream.test`, `10.0.0.1:8080`) get
/// `default_scheme`; only http and https URLs with a host are accepted.
pub fn parse_target(raw: &str, default_scheme: &str) -> Result<Url, String> {
    let absolute = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("{default_scheme}://{raw}")
    };
    let url = Url::parse(&absolute).map_err(|e| format!("invalid target '{raw}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(format!("unsupported target '{raw}'"));
    }
    Ok(url)
}

/// `host[:port]` as it would appear in a Host header.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
