//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): requests by status and backend
//! - `balancer_request_duration_seconds` (histogram): latency distribution
//! - `balancer_backend_up` (gauge): 1=live, 0=down
//! - `balancer_assignments_total` (counter): new sticky bindings per backend
//! - `balancer_purged_assignments_total` (counter): bindings dropped on down transitions
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one proxied request.
pub fn record_request(status: u16, backend: &str, start: Instant) {
    ::metrics::counter!(
        "balancer_requests_total",
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    ::metrics::histogram!("balancer_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_health(backend: &str, up: bool) {
    ::metrics::gauge!("balancer_backend_up", "backend" => backend.to_string())
        .set(if up { 1.0 } else { 0.0 });
}

pub fn record_assignment(backend: &str) {
    ::metrics::counter!("balancer_assignments_total", "backend" => backend.to_string())
        .increment(1);
}

pub fn record_purge(backend: &str, purged: usize) {
    ::metrics::counter!("balancer_purged_assignments_total", "backend" => backend.to_string())
        .increment(purged as u64);
}
