//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by HTTP method, status, rpc
//! - `gateway_request_duration_seconds` (histogram): latency by rpc
//! - `gateway_upstream_errors_total` (counter): failed RPCs by status code
//!
//! # Design Decisions
//! - Recording is always safe; without an installed recorder the macros
//!   are no-ops
//! - The Prometheus exporter is optional and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// `rpc` label for requests that matched no rule.
pub const NO_RPC: &str = "none";

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished gateway request.
pub fn record_request(method: &str, status: u16, rpc: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "rpc" => rpc.to_string()
    )
    .increment(1);

    histogram!("gateway_request_duration_seconds", "rpc" => rpc.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record an RPC that ended with a non-OK status.
pub fn record_upstream_error(code: tonic::Code) {
    counter!("gateway_upstream_errors_total", "code" => format!("{:?}", code)).increment(1);
}
