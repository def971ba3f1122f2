//! Observability: structured logging setup and Prometheus metrics.

mod metrics;
mod tracing;

pub use self::metrics::{
    MetricsError, init_metrics, record_anomaly, record_fill, record_order_retry,
    record_order_submission, record_quote_exclusion, record_risk_decision,
    record_signal_transition, record_surface_build, record_tick, update_open_positions,
};
pub use self::tracing::{TracingError, init_tracing};
