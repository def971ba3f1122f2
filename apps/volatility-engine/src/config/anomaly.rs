//! Anomaly detector configuration.

use serde::{Deserialize, Serialize};

/// Baseline window and significance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Baseline window length in ticks.
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Observations required before any anomaly can fire.
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    /// |z| above which a sample is anomalous.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
    /// Floor applied to the baseline standard deviation.
    #[serde(default = "default_min_std")]
    pub min_std: f64,
    /// Consecutive anomalous ticks required to emit a signal.
    #[serde(default = "default_persistence_ticks")]
    pub persistence_ticks: u32,
    /// Episode length after which quarantined samples join the baseline.
    #[serde(default = "default_regime_shift_ticks")]
    pub regime_shift_ticks: u32,
    /// Window for IV rank / percentile.
    #[serde(default = "default_iv_rank_window")]
    pub iv_rank_window: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            min_history: default_min_history(),
            z_threshold: default_z_threshold(),
            min_std: default_min_std(),
            persistence_ticks: default_persistence_ticks(),
            regime_shift_ticks: default_regime_shift_ticks(),
            iv_rank_window: default_iv_rank_window(),
        }
    }
}

const fn default_lookback() -> usize {
    30
}

const fn default_min_history() -> usize {
    20
}

const fn default_z_threshold() -> f64 {
    3.0
}

const fn default_min_std() -> f64 {
    1e-4
}

const fn default_persistence_ticks() -> u32 {
    1
}

const fn default_regime_shift_ticks() -> u32 {
    20
}

const fn default_iv_rank_window() -> usize {
    252
}
