//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pushmux_requests_total` (counter): proxied requests by method, status,
//!   backend resource
//! - `pushmux_request_duration_seconds` (histogram): end-to-end latency
//! - `pushmux_pool_resources` (gauge): resources currently in the pool
//! - `pushmux_pool_jobs` (gauge): affine jobs across the whole pool

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            describe_counter!(
                "pushmux_requests_total",
                "Proxied requests by method, status and backend resource"
            );
            describe_histogram!(
                "pushmux_request_duration_seconds",
                "End-to-end request latency in seconds"
            );
            describe_gauge!("pushmux_pool_resources", "Resources currently in the pool");
            describe_gauge!("pushmux_pool_jobs", "Affine jobs across the whole pool");
            tracing::info!(address = %addr, "metrics endpoint listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "failed to install metrics exporter");
        }
    }
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    counter!(
        "pushmux_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string(),
    )
    .increment(1);
    histogram!(
        "pushmux_request_duration_seconds",
        "method" => method.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the current pool shape.
pub fn record_pool_size(resources: usize, jobs: usize) {
    gauge!("pushmux_pool_resources").set(resources as f64);
    gauge!("pushmux_pool_jobs").set(jobs as f64);
}
