//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted connections by listener kind
//! - `proxy_requests_total` (counter): dispatched HTTP requests by port, leg, outcome
//! - `proxy_bytes_total` (counter): spliced bytes by direction
//! - `proxy_active_sessions` (gauge): sessions currently open
//!
//! Recording is a no-op until a recorder is installed, so every call site
//! can record unconditionally.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::net::splice::SpliceReport;
use crate::routing::Leg;

pub const CONNECTIONS_TOTAL: &str = "proxy_connections_total";
pub const REQUESTS_TOTAL: &str = "proxy_requests_total";
pub const BYTES_TOTAL: &str = "proxy_bytes_total";
pub const ACTIVE_SESSIONS: &str = "proxy_active_sessions";

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count an accepted connection by handler kind.
pub fn record_connection(kind: &'static str) {
    counter!(CONNECTIONS_TOTAL, "kind" => kind).increment(1);
}

/// Count a dispatched request by port, leg and outcome.
pub fn record_request(port: u16, leg: Leg, outcome: &'static str) {
    counter!(
        REQUESTS_TOTAL,
        "port" => port.to_string(),
        "leg" => leg.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Add the bytes a finished splice moved in each direction.
pub fn record_splice(report: &SpliceReport) {
    counter!(BYTES_TOTAL, "direction" => "to_remote").increment(report.to_remote);
    counter!(BYTES_TOTAL, "direction" => "to_client").increment(report.to_client);
}

/// Publish the live session count.
pub fn set_active_sessions(active: u64) {
    gauge!(ACTIVE_SESSIONS).set(active as f64);
}
