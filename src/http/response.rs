//! Response shaping.
//!
//! # Responsibilities
//! - Turn buffered upstream answers into client responses
//! - Strip hop-by-hop and length headers (the body sets its own length)

use axum::{
    body::Body,
    http::{header, HeaderValue, Response as HttpResponse, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::proxy::UpstreamResponse;
use crate::security::headers::strip_hop_by_hop;

/// Content type of merged override files.
pub const MERGED_CONTENT_TYPE: &str = "application/octet-stream";

/// Header telling whether a merged file came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-overlay-cache";

/// Relay an upstream response to the client.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let mut headers = upstream.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let mut response = HttpResponse::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    response
}

/// Serve merged file content.
pub fn merged(body: Bytes, cache_hit: bool) -> Response {
    let cache_status = if cache_hit { "hit" } else { "miss" };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(MERGED_CONTENT_TYPE)),
            (
                header::HeaderName::from_static(CACHE_STATUS_HEADER),
                HeaderValue::from_static(cache_status),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn test_relay_keeps_status_and_end_to_end_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("999"));

        let response = relay(UpstreamResponse {
            status: StatusCode::NOT_MODIFIED,
            headers,
            body: Bytes::new(),
        });

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[header::ETAG], "\"v1\"");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_merged_headers() {
        let response = merged(Bytes::from_static(b"[A]\nk=v\n"), true);
        assert_eq!(response.headers()[header::CONTENT_TYPE], MERGED_CONTENT_TYPE);
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "hit");
    }
}
