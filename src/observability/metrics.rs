//! Metrics collection and exposition.
//!
//! # Metrics
//! - `supervisor_reloads_total` (counter): reload attempts by outcome
//!   (`success`, `retained`, `failure`)
//! - `supervisor_reload_duration_seconds` (histogram): time from trigger to
//!   running context or failure
//! - `supervisor_generation` (gauge): number of the running generation
//! - `supervisor_generation_artifacts` (gauge): artifacts in that generation
//! - `supervisor_dispose_failures_total` (counter): superseded contexts that
//!   failed to tear down cleanly

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_reload(outcome: &'static str) {
    metrics::counter!("supervisor_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_reload_duration(started: Instant) {
    metrics::histogram!("supervisor_reload_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_generation(number: u64, artifacts: usize) {
    metrics::gauge!("supervisor_generation").set(number as f64);
    metrics::gauge!("supervisor_generation_artifacts").set(artifacts as f64);
}

pub fn record_dispose_failure() {
    metrics::counter!("supervisor_dispose_failures_total").increment(1);
}
