//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_connections_total` (counter): accepted client connections
//! - `relay_active_connections` (gauge): connections currently handled
//! - `relay_tunnels_total` (counter): finished tunnels by `end`
//! - `relay_tunnel_failures_total` (counter): failed tunnels by `stage`
//! - `relay_tunnel_bytes_total` (counter): relayed bytes by `direction`
//! - `relay_executor_requests_total` (counter): plain requests by `outcome`
//! - `relay_executor_duration_seconds` (histogram): executor run time

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::tunnel::RelayOutcome;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn connection_opened() {
    metrics::counter!("relay_connections_total").increment(1);
    metrics::gauge!("relay_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("relay_active_connections").decrement(1.0);
}

pub fn record_tunnel(outcome: &RelayOutcome) {
    metrics::counter!("relay_tunnels_total", "end" => outcome.end.as_str()).increment(1);
    metrics::counter!("relay_tunnel_bytes_total", "direction" => "client_to_upstream")
        .increment(outcome.client_to_upstream);
    metrics::counter!("relay_tunnel_bytes_total", "direction" => "upstream_to_client")
        .increment(outcome.upstream_to_client);
}

pub fn record_tunnel_failure(stage: &'static str) {
    metrics::counter!("relay_tunnel_failures_total", "stage" => stage).increment(1);
}

pub fn record_executor(outcome: &'static str, start: Instant) {
    metrics::counter!("relay_executor_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("relay_executor_duration_seconds").record(start.elapsed().as_secs_f64());
}
