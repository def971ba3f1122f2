//! Anomaly detection over surface shape metrics.

mod baseline;
mod context;
mod detector;
mod iv_rank;
mod pattern;

pub use baseline::RollingBaseline;
pub use context::{IvTrend, IvTrendReading, PremiumValue, VolatilityContext};
pub use detector::{AnomalyDetector, AnomalySignal};
pub use iv_rank::IvHistory;
pub use pattern::{AnomalyPattern, Direction, MetricKind};
