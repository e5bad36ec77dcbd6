//! Metrics collection and exposition.
//!
//! # Metrics
//! - `governance_retry_attempts_total` (counter): attempt outcomes by
//!   `outcome` (success, retry, permanent, exhausted, cancelled)
//! - `governance_rate_limit_decisions_total` (counter): admission decisions by
//!   `outcome` (allowed, rejected, unidentified)
//! - `governance_rate_limit_tracked_tenants` (gauge): live tenant windows

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const RETRY_ATTEMPTS_TOTAL: &str = "governance_retry_attempts_total";
pub const RATE_LIMIT_DECISIONS_TOTAL: &str = "governance_rate_limit_decisions_total";
pub const RATE_LIMIT_TRACKED_TENANTS: &str = "governance_rate_limit_tracked_tenants";

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_retry_attempt(outcome: &'static str) {
    counter!(RETRY_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_rate_limit_decision(outcome: &'static str) {
    counter!(RATE_LIMIT_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_tracked_tenants(count: usize) {
    gauge!(RATE_LIMIT_TRACKED_TENANTS).set(count as f64);
}
