//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define lifecycle metrics (firings, callback failures, connections)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `lifecycle_events_total` (counter): firings by event name
//! - `lifecycle_callback_failures_total` (counter): failed firings by event name
//! - `lifecycle_active_connections` (gauge): current connection count
//! - `lifecycle_connection_panics_total` (counter): connections ended by a panicking callback
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels use the event's wire name

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const EVENTS_TOTAL: &str = "lifecycle_events_total";
pub const CALLBACK_FAILURES_TOTAL: &str = "lifecycle_callback_failures_total";
pub const ACTIVE_CONNECTIONS: &str = "lifecycle_active_connections";
pub const CONNECTION_PANICS_TOTAL: &str = "lifecycle_connection_panics_total";

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one firing of `event`.
pub fn record_firing(event: &'static str) {
    ::metrics::counter!(EVENTS_TOTAL, "event" => event).increment(1);
}

/// Count one failed firing of `event`.
pub fn record_callback_failure(event: &'static str) {
    ::metrics::counter!(CALLBACK_FAILURES_TOTAL, "event" => event).increment(1);
}

/// Count one connection ended by a panicking callback.
pub fn record_connection_panic() {
    ::metrics::counter!(CONNECTION_PANICS_TOTAL).increment(1);
}

pub fn set_active_connections(count: usize) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}
