//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): completed requests by method, endpoint, status
//! - `http_request_latency_seconds` (histogram): latency by method, endpoint
//! - `http_request_size_bytes` (histogram): inbound body size
//! - `http_response_size_bytes` (histogram): outbound body size
//! - `http_requests_in_progress` (gauge): requests currently in the pipeline
//! - `gateway_denials_total` (counter): denials by pipeline stage
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Endpoint label is the request path for relayed replies and
//!   `denied:<stage>` for refusals, so refused traffic cannot grow the
//!   series count

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::admission::Stage;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_LATENCY: &str = "http_request_latency_seconds";
pub const REQUEST_SIZE: &str = "http_request_size_bytes";
pub const RESPONSE_SIZE: &str = "http_response_size_bytes";
pub const IN_PROGRESS: &str = "http_requests_in_progress";
pub const DENIALS_TOTAL: &str = "gateway_denials_total";

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Endpoint label for a completed request.
pub fn endpoint_label(path: &str, denied_by: Option<Stage>) -> String {
    match denied_by {
        Some(stage) => format!("denied:{stage}"),
        None => path.to_string(),
    }
}

/// Record one completed request.
pub fn observe(
    method: &Method,
    endpoint: &str,
    status: StatusCode,
    latency: Duration,
    request_size: usize,
    response_size: usize,
) {
    let method = method.to_string();
    let endpoint = endpoint.to_string();

    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.clone(),
        "endpoint" => endpoint.clone(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_LATENCY, "method" => method.clone(), "endpoint" => endpoint.clone())
        .record(latency.as_secs_f64());
    metrics::histogram!(REQUEST_SIZE, "method" => method.clone(), "endpoint" => endpoint.clone())
        .record(request_size as f64);
    metrics::histogram!(RESPONSE_SIZE, "method" => method, "endpoint" => endpoint)
        .record(response_size as f64);
}

pub fn record_denial(stage: Stage) {
    metrics::counter!(DENIALS_TOTAL, "stage" => stage.as_str()).increment(1);
}

/// Holds the in-progress gauge up for as long as it lives.
pub struct InFlight(());

impl InFlight {
    pub fn enter() -> Self {
        metrics::gauge!(IN_PROGRESS).increment(1.0);
        InFlight(())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(IN_PROGRESS).decrement(1.0);
    }
}
