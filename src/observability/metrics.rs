//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound calls by route and outcome
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_attempts_total` (counter): downstream attempts by route
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `pipeline_batches_total` (counter): batches by outcome
//! - `pipeline_records_total` (counter): records persisted
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::BreakerPhase;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one inbound gateway call.
pub fn record_request(route: &str, status: u16, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record one downstream attempt.
pub fn record_attempt(route: &str) {
    counter!("gateway_attempts_total", "route" => route.to_string()).increment(1);
}

/// Record a breaker's current phase.
pub fn record_breaker_state(route: &str, phase: BreakerPhase) {
    let value = match phase {
        BreakerPhase::Closed => 0.0,
        BreakerPhase::HalfOpen => 1.0,
        BreakerPhase::Open => 2.0,
    };
    gauge!("gateway_breaker_state", "route" => route.to_string()).set(value);
}

/// Record a finished batch.
pub fn record_batch(outcome: &'static str, records: usize) {
    counter!("pipeline_batches_total", "outcome" => outcome).increment(1);
    if records > 0 {
        counter!("pipeline_records_total").increment(records as u64);
    }
}
