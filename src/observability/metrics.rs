//! Metrics collection and exposition.
//!
//! # Metrics
//! - `overlay_requests_total` (counter): requests by method, status, route kind
//! - `overlay_request_duration_seconds` (histogram): latency distribution
//! - `overlay_cache_lookups_total` (counter): cache reads by result (hit/miss)
//! - `overlay_cache_puts_total` (counter): cache writes
//! - `overlay_cache_invalidated_total` (counter): entries dropped, by table
//! - `overlay_cache_errors_total` (counter): failed cache operations, by op
//! - `overlay_invalidations_total` (counter): background invalidation runs
//! - `overlay_invalidations_dropped_total` (counter): mutations that never ran
//! - `overlay_forward_errors_total` (counter): forwarder failures, by kind
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exposition on its own listener

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

static DESCRIPTIONS: Once = Once::new();

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe_metrics() {
    DESCRIPTIONS.call_once(|| {
        describe_counter!("overlay_requests_total", Unit::Count, "Requests served by the gateway.");
        describe_histogram!(
            "overlay_request_duration_seconds",
            Unit::Seconds,
            "End-to-end request latency."
        );
        describe_counter!("overlay_cache_lookups_total", Unit::Count, "Cache reads by result.");
        describe_counter!("overlay_cache_puts_total", Unit::Count, "Cache writes.");
        describe_counter!(
            "overlay_cache_invalidated_total",
            Unit::Count,
            "Cache entries dropped by tag invalidation."
        );
        describe_counter!("overlay_cache_errors_total", Unit::Count, "Failed cache operations.");
        describe_counter!(
            "overlay_invalidations_total",
            Unit::Count,
            "Background invalidation runs."
        );
        describe_counter!(
            "overlay_invalidations_dropped_total",
            Unit::Count,
            "Mutations whose invalidation could not be queued."
        );
        describe_counter!("overlay_forward_errors_total", Unit::Count, "Forwarder failures by kind.");
    });
}

pub fn record_request(method: &str, status: u16, route_kind: &'static str, start: Instant) {
    counter!(
        "overlay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route_kind
    )
    .increment(1);
    histogram!("overlay_request_duration_seconds", "route" => route_kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("overlay_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_put() {
    counter!("overlay_cache_puts_total").increment(1);
}

pub fn record_cache_invalidated(table: &str, entries: usize) {
    counter!("overlay_cache_invalidated_total", "table" => table.to_string())
        .increment(entries as u64);
}

pub fn record_cache_error(op: &'static str) {
    counter!("overlay_cache_errors_total", "op" => op).increment(1);
}

pub fn record_background_invalidation(entries: usize) {
    counter!("overlay_invalidations_total").increment(1);
    tracing::trace!(entries, "Background invalidation recorded");
}

pub fn record_invalidation_dropped() {
    counter!("overlay_invalidations_dropped_total").increment(1);
}

pub fn record_forward_error(kind: &'static str) {
    counter!("overlay_forward_errors_total", "kind" => kind).increment(1);
}
