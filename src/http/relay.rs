//! Standalone redirect-following relay.
//!
//! Every request names its destination as a full URL in the target header.
//! The relay forwards it verbatim, follows up to ten redirects itself and
//! reports the hop count in `x-relay-redirects`.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    extract::State,
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::{request, response};
use crate::proxy::{ForwardOptions, Forwarder, InboundRequest};

#[derive(Clone)]
struct RelayState {
    forwarder: Arc<Forwarder>,
    max_body: usize,
}

/// Router serving every path through the relay.
pub fn relay_router(forwarder: Arc<Forwarder>, max_body: usize) -> Router {
    let x_request_id = HeaderName::from_static(request::X_REQUEST_ID);
    Router::new()
        .route("/", any(relay_handler))
        .route("/{*path}", any(relay_handler))
        .with_state(RelayState { forwarder, max_body })
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}

async fn relay_handler(State(state): State<RelayState>, req: Request<Body>) -> Response {
    let (parts, body) = req.into_parts();
    let body = match body::to_bytes(body, state.max_body).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };
    let inbound = InboundRequest::from_parts(parts, body);

    let options = ForwardOptions {
        exact_target: true,
        follow_redirects: true,
        ..Default::default()
    };
    match state.forwarder.forward(&inbound, &options).await {
        Ok(upstream) => response::relay(upstream),
        Err(e) => {
            tracing::warn!(error = %e, kind = e.name(), "Relay request failed");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForwarderConfig;
    use crate::proxy::upstream::testing::ScriptedUpstream;
    use crate::proxy::ForwarderSettings;
    use axum::http::Method;
    use tower::ServiceExt;

    fn router(client: Arc<ScriptedUpstream>) -> Router {
        let settings = ForwarderSettings::from_config(&ForwarderConfig {
            allowed_origins: vec!["origin.test".to_string(), "relay.local".to_string()],
            ..ForwarderConfig::default()
        })
        .unwrap();
        relay_router(Arc::new(Forwarder::new(settings, client)), 1024)
    }

    #[tokio::test]
    async fn test_missing_target_is_bad_request() {
        let response = router(Arc::new(ScriptedUpstream::new()))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_relays_with_redirect_count() {
        let client = Arc::new(
            ScriptedUpstream::new()
                .reply(302, &[("location", "/final")], "")
                .reply(200, &[("content-type", "text/plain")], "done"),
        );
        let response = router(client.clone())
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/anything")
                    .header("host", "relay.local")
                    .header("x-upstream-url", "https://origin.test/start?x=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-relay-redirects"], "1");
        assert!(response.headers().contains_key("x-request-id"));
        let seen = client.requests();
        assert_eq!(seen[0].url.as_str(), "https://origin.test/start?x=1");
        assert_eq!(seen[1].url.as_str(), "https://origin.test/final");
    }

    #[tokio::test]
    async fn test_self_target_is_recursion() {
        let response = router(Arc::new(ScriptedUpstream::new()))
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "relay.local:8787")
                    .header("x-upstream-url", "http://relay.local:8787/x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::LOOP_DETECTED);
    }
}
