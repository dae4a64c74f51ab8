//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mock_requests_total` (counter): requests by method, status, route origin
//! - `mock_request_duration_seconds` (histogram): handler latency
//! - `mock_lifecycle_events_total` (counter): start/stop/restart by event
//!
//! # Design Decisions
//! - Recording is free when no exporter is installed
//! - `origin` is `custom`, `builtin` or `none` (table-level 404/405)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::routing::RouteOrigin;

/// Install the Prometheus exporter serving on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, origin: Option<RouteOrigin>, start: Instant) {
    let origin = origin.map_or("none", |o| o.as_str());
    metrics::counter!(
        "mock_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "origin" => origin
    )
    .increment(1);
    metrics::histogram!("mock_request_duration_seconds", "origin" => origin)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_lifecycle(event: &'static str) {
    metrics::counter!("mock_lifecycle_events_total", "event" => event).increment(1);
}
