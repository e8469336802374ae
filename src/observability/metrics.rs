//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests answered, by status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_worker_dispatch_total` (counter): envelopes sent, by worker
//! - `proxy_worker_exits_total` (counter): workers lost since startup
//!
//! # Design Decisions
//! - Recording is always safe; without an installed exporter it does nothing
//! - Labels stay low-cardinality: status code and worker index only

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

/// Record one answered client request.
pub fn record_request(status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!("proxy_requests_total", "status" => status.clone()).increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch(worker: usize) {
    metrics::counter!("proxy_worker_dispatch_total", "worker" => worker.to_string()).increment(1);
}

pub fn record_worker_exit() {
    metrics::counter!("proxy_worker_exits_total").increment(1);
}
