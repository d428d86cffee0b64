//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_connections_total` (counter): accepted client connections
//! - `relay_active_connections` (gauge): relays currently in flight
//! - `relay_bytes_total` (counter): bytes copied, by direction
//! - `relay_handshakes_total` (counter): inspected handshakes, by outcome
//! - `relay_connection_errors_total` (counter): aborted connections, by kind
//! - `relay_session_duration_seconds` (histogram): relay lifetime
//!
//! Until [`init_metrics`] installs a recorder every helper is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_accepted() {
    counter!("relay_connections_total").increment(1);
}

pub fn record_active_connections(active: u64) {
    gauge!("relay_active_connections").set(active as f64);
}

/// `direction` is either `client_to_server` or `server_to_client`.
pub fn record_bytes(direction: &'static str, bytes: u64) {
    counter!("relay_bytes_total", "direction" => direction).increment(bytes);
}

pub fn record_handshake(outcome: &'static str) {
    counter!("relay_handshakes_total", "outcome" => outcome).increment(1);
}

pub fn record_connection_error(kind: &'static str) {
    counter!("relay_connection_errors_total", "kind" => kind).increment(1);
}

pub fn record_session_duration(start: Instant) {
    histogram!("relay_session_duration_seconds").record(start.elapsed().as_secs_f64());
}
