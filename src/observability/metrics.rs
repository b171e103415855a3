//! Metrics collection and exposition.
//!
//! # Metrics
//! - `strings_requests_total` (counter): requests by method, status, outcome
//! - `strings_request_duration_seconds` (histogram): dispatch latency
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Outcome label names the stage that produced the response

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();

    ::metrics::counter!(
        "strings_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "outcome" => outcome
    )
    .increment(1);

    ::metrics::histogram!(
        "strings_request_duration_seconds",
        "method" => method,
        "status" => status,
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}
