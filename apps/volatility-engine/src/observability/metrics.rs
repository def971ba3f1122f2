//! Prometheus metrics for the volatility engine.
//!
//! Counters and histograms are recorded through the `metrics` facade and are
//! no-ops until [`init_metrics`] installs the exporter.
//!
//! # Example
//!
//! ```ignore
//! use volatility_engine::config::MetricsExporterConfig;
//! use volatility_engine::observability::init_metrics;
//!
//! init_metrics(&MetricsExporterConfig::default())?;
//! ```

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsExporterConfig;
use crate::domain::signal::SignalState;

/// Latency buckets from 1ms to 10s.
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the address is invalid or the exporter fails to start.
pub fn init_metrics(config: &MetricsExporterConfig) -> Result<(), MetricsError> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e: std::net::AddrParseError| MetricsError::Configuration(e.to_string()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LATENCY_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter started");
    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Surface Metrics
// ============================================================================

/// Record a quote excluded from a surface.
pub fn record_quote_exclusion(underlying: &str, reason: &str) {
    counter!(
        "quote_exclusions_total",
        "underlying" => underlying.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a completed surface build.
pub fn record_surface_build(underlying: &str, points: usize, excluded: usize) {
    counter!("surface_builds_total", "underlying" => underlying.to_string()).increment(1);
    gauge!("surface_points", "underlying" => underlying.to_string()).set(points as f64);
    gauge!("surface_excluded_quotes", "underlying" => underlying.to_string())
        .set(excluded as f64);
}

// ============================================================================
// Signal Metrics
// ============================================================================

/// Record a confirmed anomaly.
pub fn record_anomaly(underlying: &str, pattern: &str) {
    counter!(
        "anomalies_total",
        "underlying" => underlying.to_string(),
        "pattern" => pattern.to_string()
    )
    .increment(1);
}

/// Record a signal state transition.
pub fn record_signal_transition(from: SignalState, to: SignalState) {
    counter!(
        "signal_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record a risk decision. `constraint` is empty for approvals.
pub fn record_risk_decision(approved: bool, constraint: &str) {
    let outcome = if approved { "approved" } else { "rejected" };
    counter!(
        "risk_decisions_total",
        "outcome" => outcome,
        "constraint" => constraint.to_string()
    )
    .increment(1);
}

// ============================================================================
// Order Execution Metrics
// ============================================================================

/// Record the outcome of an order submission.
///
/// # Arguments
///
/// * `status` - Final submission status (e.g., "submitted", "rejected")
/// * `attempts` - Number of broker calls made
/// * `latency_seconds` - Time from first attempt to outcome
pub fn record_order_submission(status: &str, attempts: u32, latency_seconds: f64) {
    counter!("order_submissions_total", "status" => status.to_string()).increment(1);
    histogram!("order_submission_attempts").record(f64::from(attempts));
    histogram!("order_submission_latency_seconds").record(latency_seconds);
}

/// Record a retried submission.
pub fn record_order_retry(reason: &str) {
    counter!("order_retries_total", "reason" => reason.to_string()).increment(1);
}

/// Record a fill offered to the reconciler.
pub fn record_fill(purpose: &str, outcome: &str) {
    counter!(
        "fills_total",
        "purpose" => purpose.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Update the open position gauge.
pub fn update_open_positions(count: usize) {
    gauge!("open_positions").set(count as f64);
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

/// Record a completed tick.
pub fn record_tick(processed: usize, skipped: usize, duration_seconds: f64) {
    counter!("ticks_total").increment(1);
    gauge!("tick_underlyings_processed").set(processed as f64);
    gauge!("tick_underlyings_skipped").set(skipped as f64);
    histogram!("tick_duration_seconds").record(duration_seconds);
}
