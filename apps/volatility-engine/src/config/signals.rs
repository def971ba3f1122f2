//! Signal generation configuration.

use serde::{Deserialize, Serialize};

/// Aggregation weight per anomaly pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternWeights {
    /// Weight for ATM IV deviations.
    #[serde(default = "default_mean_reversion_weight")]
    pub mean_reversion_setup: f64,
    /// Weight for risk-reversal breaks.
    #[serde(default = "default_skew_weight")]
    pub skew_break: f64,
    /// Weight for term-slope moves.
    #[serde(default = "default_term_weight")]
    pub term_structure_inversion: f64,
    /// Weight for butterfly moves.
    #[serde(default = "default_curvature_weight")]
    pub smile_curvature_shift: f64,
}

impl Default for PatternWeights {
    fn default() -> Self {
        Self {
            mean_reversion_setup: default_mean_reversion_weight(),
            skew_break: default_skew_weight(),
            term_structure_inversion: default_term_weight(),
            smile_curvature_shift: default_curvature_weight(),
        }
    }
}

/// Correlation window, corroboration and lifetime of trade signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Anomalies older than this are dropped from evaluation.
    #[serde(default = "default_correlation_window_secs")]
    pub correlation_window_secs: u64,
    /// Seconds a proposed signal may wait for a risk decision.
    #[serde(default = "default_signal_ttl_secs")]
    pub signal_ttl_secs: u64,
    /// Anomalies agreeing on a direction needed to propose.
    #[serde(default = "default_min_corroboration")]
    pub min_corroboration: usize,
    /// A single anomaly at or above this |z| proposes on its own.
    #[serde(default = "default_strong_magnitude")]
    pub strong_magnitude: f64,
    /// Divisor turning weighted |z| into confidence.
    #[serde(default = "default_confidence_scale")]
    pub confidence_scale: f64,
    /// Candidates below this confidence are dropped.
    #[serde(default)]
    pub min_confidence: f64,
    /// Confidence shift per point of premium buyer score (IV against
    /// realized volatility and IV trend). Zero disables the context.
    #[serde(default = "default_context_weight")]
    pub context_weight: f64,
    /// Preferred days to expiry for the traded contract.
    #[serde(default = "default_target_dte")]
    pub target_dte: f64,
    /// Pattern weights.
    #[serde(default)]
    pub weights: PatternWeights,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            correlation_window_secs: default_correlation_window_secs(),
            signal_ttl_secs: default_signal_ttl_secs(),
            min_corroboration: default_min_corroboration(),
            strong_magnitude: default_strong_magnitude(),
            confidence_scale: default_confidence_scale(),
            min_confidence: 0.0,
            context_weight: default_context_weight(),
            target_dte: default_target_dte(),
            weights: PatternWeights::default(),
        }
    }
}

const fn default_mean_reversion_weight() -> f64 {
    1.0
}

const fn default_skew_weight() -> f64 {
    0.8
}

const fn default_term_weight() -> f64 {
    0.7
}

const fn default_curvature_weight() -> f64 {
    0.5
}

const fn default_correlation_window_secs() -> u64 {
    300
}

const fn default_signal_ttl_secs() -> u64 {
    60
}

const fn default_min_corroboration() -> usize {
    2
}

const fn default_strong_magnitude() -> f64 {
    3.5
}

const fn default_confidence_scale() -> f64 {
    8.0
}

const fn default_context_weight() -> f64 {
    0.025
}

const fn default_target_dte() -> f64 {
    30.0
}
