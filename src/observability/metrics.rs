//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_upstream_failures_total` (counter): failed exchanges by upstream, kind

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::Route;
use crate::upstream::{FailureKind, UpstreamTarget};

/// Install the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: Route, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.as_str()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure(target: UpstreamTarget, kind: FailureKind) {
    metrics::counter!(
        "gateway_upstream_failures_total",
        "upstream" => target.as_str(),
        "kind" => kind.as_str()
    )
    .increment(1);
}
