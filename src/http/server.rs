//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway handler
//! - Wire up middleware (request ID, tracing, timeout, body limit, gate)
//! - Dispatch requests by route kind (passthrough or merge)
//! - Serve merged files through the cache
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{self, Body},
    extract::State,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{CacheKey, PartitionRegistry};
use crate::config::{GatewayConfig, RouteKind};
use crate::gate::{gate_middleware, GateStore};
use crate::hotfix::{merge, HotfixStore, HOTFIXES_TABLE};
use crate::http::{request, response};
use crate::observability::metrics;
use crate::proxy::{ForwardError, ForwardOptions, Forwarder, InboundRequest};
use crate::routing::Router as GatewayRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub router: Arc<GatewayRouter>,
    pub forwarder: Arc<Forwarder>,
    pub cache: Arc<PartitionRegistry>,
    pub hotfixes: Arc<HotfixStore>,
    pub gate: Arc<GateStore>,
    pub started_at: Instant,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let x_request_id = HeaderName::from_static(request::X_REQUEST_ID);

        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .layer(middleware::from_fn_with_state(state.gate.clone(), gate_middleware))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request::request_id(req.headers()),
                    method = %req.method(),
                    path = %req.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    /// The router, for in-process tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Entry point for all gateway traffic that the gate did not answer.
async fn gateway_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let method = parts.method.to_string();

    let route = state.router.match_request(&parts.uri, &parts.headers);
    let kind = route.map(|r| r.kind).unwrap_or_default();
    let ttl = route.and_then(|r| r.cache_ttl_secs);

    tracing::debug!(
        route = route.map(|r| r.name.as_str()).unwrap_or("default"),
        kind = kind.as_str(),
        "Dispatching request"
    );

    let body = match body::to_bytes(body, state.config.security.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            metrics::record_request(&method, 413, kind.as_str(), start);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };
    let inbound = InboundRequest::from_parts(parts, body);

    let result = match kind {
        RouteKind::Passthrough => passthrough(&state, &inbound).await,
        RouteKind::Merge => merged(&state, &inbound, ttl).await,
    };
    let response = result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, kind = e.name(), "Request failed");
        e.into_response()
    });

    metrics::record_request(&method, response.status().as_u16(), kind.as_str(), start);
    response
}

async fn passthrough(state: &AppState, inbound: &InboundRequest) -> Result<Response, ForwardError> {
    let options = ForwardOptions {
        follow_redirects: state.config.forwarder.follow_redirects,
        ..Default::default()
    };
    let upstream = state.forwarder.forward(inbound, &options).await?;
    Ok(response::relay(upstream))
}

/// Merge route: cached read-through of `upstream file + hotfixes`.
async fn merged(
    state: &AppState,
    inbound: &InboundRequest,
    ttl_secs: Option<u64>,
) -> Result<Response, ForwardError> {
    let file_id = request::file_id(inbound.uri.path())
        .ok_or_else(|| ForwardError::BadRequest("request path names no file".into()))?;

    let options = ForwardOptions {
        add_headers: vec![(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"))],
        ..Default::default()
    };
    let url = state.forwarder.resolve(inbound, &options)?;
    let key = CacheKey::merged(&inbound.method, &url, &file_id);

    let partition = request::partition_id(&inbound.headers, &state.config.cache);
    let cache = state.cache.facade(partition);

    if let Some(cached) = cache.get(key.as_str()).await {
        tracing::debug!(file = %file_id, key = %key, "Serving merged file from cache");
        return Ok(response::merged(cached, true));
    }

    let upstream = state.forwarder.forward(inbound, &options).await?;
    if !upstream.status.is_success() {
        // 304 and unfollowed redirects carry no file to merge.
        return Ok(response::relay(upstream));
    }

    let content = match std::str::from_utf8(&upstream.body) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(file = %file_id, error = %e, "Upstream file is not UTF-8, relaying unmerged");
            return Ok(response::relay(upstream));
        }
    };
    let overrides = state.hotfixes.for_file(&file_id);
    let merged = Bytes::from(merge(content, &overrides, &file_id));
    tracing::debug!(
        file = %file_id,
        overrides = overrides.len(),
        bytes = merged.len(),
        "Merged upstream file"
    );

    cache
        .put(key.as_str(), merged.clone(), &[HOTFIXES_TABLE], ttl_secs)
        .await;
    Ok(response::merged(merged, false))
}
