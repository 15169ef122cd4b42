//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_rate_limited_total` (counter): rejected requests by reason
//! - `gateway_cache_events_total` (counter): response-cache hits/misses
//! - `gateway_circuit_transitions_total` (counter): breaker transitions
//! - `gateway_ws_connections` (gauge): active proxied WS connections
//! - `gateway_instance_health` (gauge): 1=healthy, 0=unhealthy

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string(),
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "service" => service.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(reason: &str) {
    counter!("gateway_rate_limited_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_cache_event(service: &str, hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    counter!(
        "gateway_cache_events_total",
        "service" => service.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

pub fn record_circuit_transition(service: &str, state: &str) {
    counter!(
        "gateway_circuit_transitions_total",
        "service" => service.to_string(),
        "state" => state.to_string(),
    )
    .increment(1);
}

pub fn ws_connection_opened() {
    gauge!("gateway_ws_connections").increment(1.0);
}

pub fn ws_connection_closed() {
    gauge!("gateway_ws_connections").decrement(1.0);
}

pub fn record_instance_health(url: &str, healthy: bool) {
    gauge!("gateway_instance_health", "instance" => url.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
