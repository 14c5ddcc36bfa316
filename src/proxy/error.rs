//! Forwarder error taxonomy.
//!
//! Every failure the forwarder reports maps to a fixed status code and is
//! rendered as `{"error": <message>, "code": <status>, "name": <kind>}`.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::proxy::upstream::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("No target host provided")]
    NoTarget,

    #[error("Recursion detected: {0}")]
    Recursion(String),

    #[error("Destination not allowed: {0}")]
    NotAllowed(String),

    /// The upstream answered with a status the gateway does not relay.
    #[error("Upstream responded with {status}")]
    UpstreamError {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    #[error("Proxy error: {0}")]
    ProxyError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::NoTarget | ForwardError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ForwardError::Recursion(_) => StatusCode::LOOP_DETECTED,
            ForwardError::NotAllowed(_) => StatusCode::FORBIDDEN,
            ForwardError::UpstreamError { .. }
            | ForwardError::ProxyError(_)
            | ForwardError::TooManyRedirects(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ForwardError::NoTarget => "NoTarget",
            ForwardError::Recursion(_) => "Recursion",
            ForwardError::NotAllowed(_) => "NotAllowed",
            ForwardError::UpstreamError { .. } => "UpstreamError",
            ForwardError::ProxyError(_) => "ProxyError",
            ForwardError::BadRequest(_) => "BadRequest",
            ForwardError::TooManyRedirects(_) => "TooManyRedirects",
        }
    }
}

impl From<TransportError> for ForwardError {
    fn from(error: TransportError) -> Self {
        ForwardError::ProxyError(error.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
    name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let upstream_status = match &self {
            ForwardError::UpstreamError { status, .. } => Some(status.as_u16()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: status.as_u16(),
            name: self.name(),
            upstream_status,
        };
        (status, Json(body)).into_response()
    }
}
