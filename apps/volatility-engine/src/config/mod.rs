//! Configuration loading, validation and environment interpolation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use volatility_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("deploy/engine.yaml"))?;
//! println!("z threshold: {}", config.anomaly.z_threshold);
//! ```

mod anomaly;
mod execution;
mod observability;
mod pipeline;
mod risk;
mod signals;
mod surface;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anomaly::AnomalyConfig;
pub use execution::ExecutionConfig;
pub use observability::{LoggingConfig, MetricsExporterConfig, ObservabilityConfig};
pub use pipeline::PipelineConfig;
pub use risk::RiskConfig;
pub use signals::{PatternWeights, SignalConfig};
pub use surface::SurfaceConfig;

use crate::domain::risk::SizingRule;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Surface construction.
    #[serde(default)]
    pub surface: SurfaceConfig,
    /// Anomaly detection.
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    /// Signal generation.
    #[serde(default)]
    pub signals: SignalConfig,
    /// Risk limits and sizing.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Order execution.
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Tick driver.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn fraction_in_unit(name: &str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(invalid(format!("{name} must be in (0, 1], got {value}")));
    }
    Ok(())
}

/// Validate configuration ranges.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` naming the first invalid field.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let s = &config.surface;
    if !(-1.0..=1.0).contains(&s.risk_free_rate) {
        return Err(invalid("surface.risk_free_rate must be between -1.0 and 1.0"));
    }
    if !(0.0..=1.0).contains(&s.dividend_yield) {
        return Err(invalid("surface.dividend_yield must be between 0.0 and 1.0"));
    }
    if s.max_relative_spread <= 0.0 {
        return Err(invalid("surface.max_relative_spread must be positive"));
    }
    if let (Some(min), Some(max)) = (s.min_dte, s.max_dte) {
        if min > max {
            return Err(invalid("surface.min_dte must not exceed surface.max_dte"));
        }
    }
    if !(s.put_wing_moneyness > 0.0 && s.put_wing_moneyness < 1.0) {
        return Err(invalid("surface.put_wing_moneyness must be in (0, 1)"));
    }
    if s.call_wing_moneyness <= 1.0 {
        return Err(invalid("surface.call_wing_moneyness must exceed 1.0"));
    }
    let iv = &s.iv_solver;
    if iv.min_vol <= 0.0 || iv.max_vol <= iv.min_vol {
        return Err(invalid("surface.iv_solver requires 0 < min_vol < max_vol"));
    }
    if iv.max_iterations == 0 || iv.tolerance <= 0.0 {
        return Err(invalid(
            "surface.iv_solver requires positive max_iterations and tolerance",
        ));
    }

    let a = &config.anomaly;
    if a.lookback < 2 {
        return Err(invalid("anomaly.lookback must be at least 2"));
    }
    if a.min_history < 2 || a.min_history > a.lookback {
        return Err(invalid("anomaly.min_history must be in [2, lookback]"));
    }
    if a.z_threshold <= 0.0 {
        return Err(invalid("anomaly.z_threshold must be positive"));
    }
    if a.min_std <= 0.0 {
        return Err(invalid("anomaly.min_std must be positive"));
    }
    if a.persistence_ticks == 0 {
        return Err(invalid("anomaly.persistence_ticks must be at least 1"));
    }
    if a.regime_shift_ticks < a.persistence_ticks {
        return Err(invalid(
            "anomaly.regime_shift_ticks must be at least persistence_ticks",
        ));
    }

    let sig = &config.signals;
    if sig.signal_ttl_secs == 0 {
        return Err(invalid("signals.signal_ttl_secs must be positive"));
    }
    if sig.min_corroboration == 0 {
        return Err(invalid("signals.min_corroboration must be at least 1"));
    }
    if sig.confidence_scale <= 0.0 {
        return Err(invalid("signals.confidence_scale must be positive"));
    }
    if !(0.0..=1.0).contains(&sig.min_confidence) {
        return Err(invalid("signals.min_confidence must be between 0.0 and 1.0"));
    }
    if !sig.context_weight.is_finite() || sig.context_weight < 0.0 {
        return Err(invalid("signals.context_weight must be non-negative"));
    }
    let w = &sig.weights;
    let weights = [
        w.mean_reversion_setup,
        w.skew_break,
        w.term_structure_inversion,
        w.smile_curvature_shift,
    ];
    if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
        return Err(invalid("signals.weights must be non-negative"));
    }

    let r = &config.risk;
    if r.initial_capital <= Decimal::ZERO {
        return Err(invalid("risk.initial_capital must be positive"));
    }
    if r.contract_multiplier <= Decimal::ZERO {
        return Err(invalid("risk.contract_multiplier must be positive"));
    }
    fraction_in_unit("risk.max_underlying_exposure", r.max_underlying_exposure)?;
    fraction_in_unit("risk.max_portfolio_exposure", r.max_portfolio_exposure)?;
    if r.max_underlying_exposure > r.max_portfolio_exposure {
        return Err(invalid(
            "risk.max_underlying_exposure must not exceed risk.max_portfolio_exposure",
        ));
    }
    fraction_in_unit("risk.max_drawdown", r.max_drawdown)?;
    if r.capital_preservation_floor < Decimal::ZERO || r.capital_preservation_floor >= Decimal::ONE {
        return Err(invalid("risk.capital_preservation_floor must be in [0, 1)"));
    }
    fraction_in_unit("risk.stop_loss_pct", r.stop_loss_pct)?;
    if r.take_profit_pct.is_some_and(|tp| tp <= Decimal::ZERO) {
        return Err(invalid("risk.take_profit_pct must be positive when set"));
    }
    if r.max_contracts == 0 {
        return Err(invalid("risk.max_contracts must be at least 1"));
    }
    if r.realized_vol_window < 2 || r.periods_per_year <= 0.0 {
        return Err(invalid(
            "risk.realized_vol_window must be at least 2 and periods_per_year positive",
        ));
    }
    match &r.sizing {
        SizingRule::FixedFraction { fraction } => {
            fraction_in_unit("risk.sizing.fraction", *fraction)?;
        }
        SizingRule::VolatilityAdjusted {
            fraction,
            target_vol,
            min_scale,
            max_scale,
        } => {
            fraction_in_unit("risk.sizing.fraction", *fraction)?;
            if *target_vol <= 0.0 || *min_scale <= 0.0 || max_scale < min_scale {
                return Err(invalid(
                    "risk.sizing requires target_vol > 0 and 0 < min_scale <= max_scale",
                ));
            }
        }
    }

    let e = &config.execution;
    if e.submit_timeout_ms == 0 || e.cancel_timeout_ms == 0 {
        return Err(invalid("execution timeouts must be positive"));
    }
    if e.retry.max_attempts == 0 {
        return Err(invalid("execution.retry.max_attempts must be at least 1"));
    }
    if e.retry.backoff_multiplier < 1.0 || !(0.0..=1.0).contains(&e.retry.jitter_factor) {
        return Err(invalid(
            "execution.retry requires backoff_multiplier >= 1 and jitter_factor in [0, 1]",
        ));
    }
    if e.fill_channel_capacity == 0 || e.finished_order_retention == 0 {
        return Err(invalid(
            "execution.fill_channel_capacity and execution.finished_order_retention must be positive",
        ));
    }

    if config.pipeline.tick_interval_ms == 0 || config.pipeline.quote_timeout_ms == 0 {
        return Err(invalid("pipeline intervals must be positive"));
    }

    let format = config.observability.logging.format.as_str();
    if !matches!(format, "json" | "pretty") {
        return Err(invalid(format!(
            "observability.logging.format must be json or pretty, got {format}"
        )));
    }

    Ok(())
}
