//! Tick driver configuration.

use serde::{Deserialize, Serialize};

/// Tick cadence and the underlyings to scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Timeout for fetching one underlying's quotes.
    #[serde(default = "default_quote_timeout_ms")]
    pub quote_timeout_ms: u64,
    /// Underlyings to scan each tick.
    #[serde(default)]
    pub underlyings: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            quote_timeout_ms: default_quote_timeout_ms(),
            underlyings: Vec::new(),
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    60_000
}

const fn default_quote_timeout_ms() -> u64 {
    5_000
}
