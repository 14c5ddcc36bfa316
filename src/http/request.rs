//! Request inspection helpers.
//!
//! # Responsibilities
//! - Request ID header name and lookup
//! - Partition selection
//! - File id extraction for merge routes

use axum::http::HeaderMap;

use crate::config::CacheConfig;

/// Header carrying the request ID, set by the outermost layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID of the current request, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Partition from the configured header, else the default partition.
pub fn partition_id<'a>(headers: &'a HeaderMap, config: &'a CacheConfig) -> &'a str {
    headers
        .get(config.partition_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(config.default_partition.as_str())
}

/// Last non-empty path segment, percent-decoded.
pub fn file_id(path: &str) -> Option<String> {
    let segment = path.rsplit('/').find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment).ok()?;
    (!decoded.is_empty()).then(|| decoded.into_owned())
}
