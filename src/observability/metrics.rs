//! Metrics collection and exposition.
//!
//! # Metrics
//! - `camo_requests_total` (counter): client responses by status code
//! - `camo_bytes_total` (counter): body bytes streamed to clients
//! - `camo_denied_total` (counter): requests refused by the security filter
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Exporter is optional; recording without one installed is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_request(status: u16) {
    metrics::counter!("camo_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_bytes(count: u64) {
    metrics::counter!("camo_bytes_total").increment(count);
}

pub fn record_denied(reason: &'static str) {
    metrics::counter!("camo_denied_total", "reason" => reason).increment(1);
}
