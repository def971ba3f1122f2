//! IV rank and IV percentile over a trailing window.

use std::collections::VecDeque;

use super::context::{IvTrendReading, LONG_WINDOW};

/// Trailing history of ATM implied volatility.
#[derive(Debug, Clone)]
pub struct IvHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl IvHistory {
    /// Create an empty history of at most `capacity` observations.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record an observation.
    pub fn push(&mut self, iv: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(iv);
    }

    /// Drop all observations.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Most recent observation.
    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Trend of the latest observation against its moving averages.
    #[must_use]
    pub fn trend(&self) -> Option<IvTrendReading> {
        let tail: Vec<f64> = self
            .values
            .iter()
            .skip(self.values.len().saturating_sub(LONG_WINDOW))
            .copied()
            .collect();
        IvTrendReading::classify(&tail)
    }

    /// `(iv - min) / (max - min) * 100`; 50 when the window is flat.
    #[must_use]
    pub fn rank(&self, iv: f64) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max - min <= f64::EPSILON {
            return Some(50.0);
        }
        Some(((iv - min) / (max - min) * 100.0).clamp(0.0, 100.0))
    }

    /// Share of observations at or below `iv`, as a percentage.
    #[must_use]
    pub fn percentile(&self, iv: f64) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }
        let below = self.values.iter().filter(|v| **v <= iv).count();
        Some(below as f64 / self.values.len() as f64 * 100.0)
    }
}
