//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stagehand_requests_total` (counter): dispatched requests by method, status
//! - `stagehand_request_duration_seconds` (histogram): dispatch latency
//! - `stagehand_in_flight_requests` (gauge): requests not yet finished
//! - `stagehand_open_connections` (gauge): accepted connections not yet closed
//! - `stagehand_connections_total` (counter): accepted connections

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("stagehand_requests_total", &labels).increment(1);
    metrics::histogram!("stagehand_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
