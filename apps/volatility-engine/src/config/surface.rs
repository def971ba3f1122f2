//! Surface construction configuration.

use serde::{Deserialize, Serialize};

use crate::domain::surface::IvSolverConfig;

/// Quote filtering, pricing inputs and metric placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Risk-free rate (annualized, continuous).
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Continuous dividend yield.
    #[serde(default)]
    pub dividend_yield: f64,
    /// Maximum (ask - bid) / mid before a quote is excluded.
    #[serde(default = "default_max_relative_spread")]
    pub max_relative_spread: f64,
    /// Minimum session volume (checked only when the quote reports it).
    #[serde(default)]
    pub min_volume: u64,
    /// Minimum open interest (checked only when the quote reports it).
    #[serde(default)]
    pub min_open_interest: u64,
    /// Exclude expiries closer than this many days.
    #[serde(default)]
    pub min_dte: Option<f64>,
    /// Exclude expiries further than this many days.
    #[serde(default)]
    pub max_dte: Option<f64>,
    /// Put wing strike / forward for risk reversal and butterfly.
    #[serde(default = "default_put_wing")]
    pub put_wing_moneyness: f64,
    /// Call wing strike / forward for risk reversal and butterfly.
    #[serde(default = "default_call_wing")]
    pub call_wing_moneyness: f64,
    /// Implied volatility solver.
    #[serde(default)]
    pub iv_solver: IvSolverConfig,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            dividend_yield: 0.0,
            max_relative_spread: default_max_relative_spread(),
            min_volume: 0,
            min_open_interest: 0,
            min_dte: None,
            max_dte: None,
            put_wing_moneyness: default_put_wing(),
            call_wing_moneyness: default_call_wing(),
            iv_solver: IvSolverConfig::default(),
        }
    }
}

const fn default_risk_free_rate() -> f64 {
    0.05
}

const fn default_max_relative_spread() -> f64 {
    0.5
}

const fn default_put_wing() -> f64 {
    0.8
}

const fn default_call_wing() -> f64 {
    1.2
}
