//! Gate middleware.
//! Serves stored entries verbatim before routing and forwarding.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::gate::store::GateStore;

pub async fn gate_middleware(
    State(gate): State<Arc<GateStore>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(entry) = gate.get(req.uri().path(), req.method()) else {
        return next.run(req).await;
    };

    tracing::debug!(path = %entry.path, method = %entry.method, "Serving gate entry");
    let content_type = HeaderValue::from_str(&entry.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], entry.body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::store::GateEntry;
    use axum::{http::Method, middleware, routing::any, Router};
    use bytes::Bytes;
    use tower::ServiceExt;

    fn app(gate: Arc<GateStore>) -> Router {
        Router::new()
            .route("/{*path}", any(|| async { "forwarded" }))
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Option<String>, Bytes) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body)
    }

    #[tokio::test]
    async fn test_hit_short_circuits() {
        let gate = Arc::new(GateStore::new());
        gate.set(GateEntry {
            path: "/content/api/pages".to_string(),
            method: Method::GET,
            body: Bytes::from_static(b"{\"pages\":[]}"),
            content_type: "application/json".to_string(),
        });

        let (status, content_type, body) = call(app(gate.clone()), Method::GET, "/content/api/pages").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, Bytes::from_static(b"{\"pages\":[]}"));

        let (_, _, body) = call(app(gate), Method::POST, "/content/api/pages").await;
        assert_eq!(body, Bytes::from_static(b"forwarded"));
    }

    #[tokio::test]
    async fn test_query_string_does_not_affect_match() {
        let gate = Arc::new(GateStore::new());
        gate.set(GateEntry {
            path: "/a".to_string(),
            method: Method::GET,
            body: Bytes::from_static(b"gated"),
            content_type: "text/plain".to_string(),
        });
        let (_, _, body) = call(app(gate), Method::GET, "/a?lang=en").await;
        assert_eq!(body, Bytes::from_static(b"gated"));
    }
}
