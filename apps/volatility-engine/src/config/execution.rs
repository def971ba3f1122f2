//! Order execution configuration.

use serde::{Deserialize, Serialize};

use crate::application::retry::RetryPolicy;

/// Broker call timeouts, retry policy and exit rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Timeout for a single submit call.
    #[serde(default = "default_call_timeout_ms")]
    pub submit_timeout_ms: u64,
    /// Timeout for a single cancel call.
    #[serde(default = "default_call_timeout_ms")]
    pub cancel_timeout_ms: u64,
    /// Retry policy for submissions.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Close positions when days to expiry fall to this level.
    #[serde(default = "default_time_stop_dte")]
    pub time_stop_dte: Option<f64>,
    /// Capacity of the fill notification channel.
    #[serde(default = "default_fill_channel_capacity")]
    pub fill_channel_capacity: usize,
    /// Finished orders kept for late fills and inspection before the oldest
    /// is dropped.
    #[serde(default = "default_finished_order_retention")]
    pub finished_order_retention: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: default_call_timeout_ms(),
            cancel_timeout_ms: default_call_timeout_ms(),
            retry: RetryPolicy::default(),
            time_stop_dte: default_time_stop_dte(),
            fill_channel_capacity: default_fill_channel_capacity(),
            finished_order_retention: default_finished_order_retention(),
        }
    }
}

const fn default_call_timeout_ms() -> u64 {
    2_000
}

#[allow(clippy::unnecessary_wraps)]
const fn default_time_stop_dte() -> Option<f64> {
    Some(7.0)
}

const fn default_fill_channel_capacity() -> usize {
    1_024
}

const fn default_finished_order_retention() -> usize {
    4_096
}
