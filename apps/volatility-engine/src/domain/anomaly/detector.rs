//! Per-underlying anomaly detector with debounce and regime adoption.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::baseline::RollingBaseline;
use super::context::VolatilityContext;
use super::iv_rank::IvHistory;
use super::pattern::{AnomalyPattern, Direction, MetricKind};
use crate::config::AnomalyConfig;
use crate::domain::shared::{Timestamp, UnderlyingId};
use crate::domain::surface::SurfaceMetrics;
use crate::observability;

/// A statistically significant deviation of one surface metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySignal {
    /// Underlying identifier.
    pub underlying: UnderlyingId,
    /// Pattern variant.
    pub pattern: AnomalyPattern,
    /// Metric that deviated.
    pub metric: MetricKind,
    /// Signed distance from baseline in standard deviations.
    pub magnitude: f64,
    /// Observed metric value.
    pub observed: f64,
    /// Baseline mean at detection.
    pub baseline_mean: f64,
    /// Baseline standard deviation at detection (before flooring).
    pub baseline_std: f64,
    /// Detection time.
    pub timestamp: Timestamp,
    /// Suggested trade direction.
    pub direction: Direction,
    /// ATM IV rank over the history window.
    pub iv_rank: Option<f64>,
    /// ATM IV percentile over the history window.
    pub iv_percentile: Option<f64>,
}

#[derive(Debug, Clone)]
struct MetricTracker {
    baseline: RollingBaseline,
    quarantine: Vec<f64>,
    streak: u32,
    positive: bool,
    confirmed: bool,
}

impl MetricTracker {
    fn new(lookback: usize) -> Self {
        Self {
            baseline: RollingBaseline::new(lookback),
            quarantine: Vec::new(),
            streak: 0,
            positive: false,
            confirmed: false,
        }
    }

    fn end_episode(&mut self) {
        self.quarantine.clear();
        self.streak = 0;
        self.confirmed = false;
    }

    fn adopt_quarantine(&mut self) {
        for v in self.quarantine.drain(..) {
            self.baseline.push(v);
        }
        self.streak = 0;
        self.confirmed = false;
    }
}

/// Rolling-baseline detector owned by a single underlying's worker.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    underlying: UnderlyingId,
    config: AnomalyConfig,
    trackers: BTreeMap<MetricKind, MetricTracker>,
    iv_history: IvHistory,
}

impl AnomalyDetector {
    /// Create a detector with empty baselines.
    #[must_use]
    pub fn new(underlying: UnderlyingId, config: AnomalyConfig) -> Self {
        let trackers = MetricKind::ALL
            .into_iter()
            .map(|m| (m, MetricTracker::new(config.lookback)))
            .collect();
        let iv_history = IvHistory::new(config.iv_rank_window);
        Self {
            underlying,
            config,
            trackers,
            iv_history,
        }
    }

    /// Discard all history and open episodes.
    pub fn reset(&mut self) {
        for tracker in self.trackers.values_mut() {
            tracker.baseline.clear();
            tracker.end_episode();
        }
        self.iv_history.clear();
        tracing::info!(underlying = %self.underlying, "Anomaly detector reset");
    }

    /// Underlying this detector tracks.
    #[must_use]
    pub const fn underlying(&self) -> &UnderlyingId {
        &self.underlying
    }

    /// Observations folded into the baseline for `metric`.
    #[must_use]
    pub fn history_len(&self, metric: MetricKind) -> usize {
        self.trackers.get(&metric).map_or(0, |t| t.baseline.len())
    }

    /// Consecutive anomalous ticks in the current episode for `metric`.
    #[must_use]
    pub fn streak(&self, metric: MetricKind) -> u32 {
        self.trackers.get(&metric).map_or(0, |t| t.streak)
    }

    /// Premium context at the latest observation, given the underlying's
    /// realized volatility.
    #[must_use]
    pub fn context(&self, realized_vol: Option<f64>) -> VolatilityContext {
        VolatilityContext::new(self.iv_history.latest(), realized_vol, self.iv_history.trend())
    }

    /// Feed one tick of surface metrics. Returns the anomalies confirmed on this tick.
    pub fn observe(&mut self, metrics: &SurfaceMetrics, now: Timestamp) -> Vec<AnomalySignal> {
        self.iv_history.push(metrics.atm_iv);
        let iv_rank = self.iv_history.rank(metrics.atm_iv);
        let iv_percentile = self.iv_history.percentile(metrics.atm_iv);

        let mut signals = Vec::new();
        for metric in MetricKind::ALL {
            let Some(value) = metric.value(metrics) else {
                continue;
            };
            if !value.is_finite() {
                tracing::warn!(
                    underlying = %self.underlying,
                    metric = ?metric,
                    "Non-finite metric skipped"
                );
                continue;
            }
            if let Some(mut signal) = self.observe_metric(metric, value, now) {
                signal.iv_rank = iv_rank;
                signal.iv_percentile = iv_percentile;
                signals.push(signal);
            }
        }
        signals
    }

    fn observe_metric(
        &mut self,
        metric: MetricKind,
        value: f64,
        now: Timestamp,
    ) -> Option<AnomalySignal> {
        let config = &self.config;
        let tracker = self.trackers.get_mut(&metric)?;

        if tracker.baseline.len() < config.min_history {
            tracker.baseline.push(value);
            return None;
        }

        let z = tracker.baseline.z_score(value, config.min_std)?;
        if z.abs() <= config.z_threshold {
            if tracker.streak > 0 {
                tracing::debug!(
                    underlying = %self.underlying,
                    metric = ?metric,
                    ticks = tracker.streak,
                    confirmed = tracker.confirmed,
                    "Anomaly episode ended"
                );
                tracker.end_episode();
            }
            tracker.baseline.push(value);
            return None;
        }

        let positive = z > 0.0;
        if tracker.streak > 0 && tracker.positive != positive {
            tracker.end_episode();
        }
        tracker.positive = positive;
        tracker.quarantine.push(value);
        tracker.streak += 1;

        let mut signal = None;
        if !tracker.confirmed && tracker.streak >= config.persistence_ticks {
            tracker.confirmed = true;
            let pattern = metric.pattern();
            let direction = pattern.direction(z);
            signal = Some(AnomalySignal {
                underlying: self.underlying.clone(),
                pattern,
                metric,
                magnitude: z,
                observed: value,
                baseline_mean: tracker.baseline.mean().unwrap_or(value),
                baseline_std: tracker.baseline.std_dev().unwrap_or(0.0),
                timestamp: now,
                direction,
                iv_rank: None,
                iv_percentile: None,
            });
            observability::record_anomaly(self.underlying.as_str(), pattern.label());
            tracing::info!(
                underlying = %self.underlying,
                pattern = %pattern,
                z_score = z,
                observed = value,
                direction = %direction,
                "Anomaly detected"
            );
        }

        if tracker.streak > config.regime_shift_ticks {
            tracing::info!(
                underlying = %self.underlying,
                metric = ?metric,
                adopted = tracker.quarantine.len(),
                "Persistent deviation adopted as new regime"
            );
            tracker.adopt_quarantine();
        }

        signal
    }
}
