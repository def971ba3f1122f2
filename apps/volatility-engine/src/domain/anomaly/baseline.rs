//! Fixed-window rolling baseline.

use std::collections::VecDeque;

/// Rolling window of observations with mean and sample standard deviation.
#[derive(Debug, Clone)]
pub struct RollingBaseline {
    window: VecDeque<f64>,
    capacity: usize,
}

impl RollingBaseline {
    /// Create an empty baseline holding at most `capacity` observations.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Add an observation, evicting the oldest when full.
    pub fn push(&mut self, value: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Number of observations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Drop all observations.
    pub fn clear(&mut self) {
        self.window.clear();
    }

    /// Arithmetic mean, `None` when empty.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    /// Sample standard deviation (n - 1), `None` with fewer than two observations.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.window.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let ss: f64 = self.window.iter().map(|v| (v - mean).powi(2)).sum();
        Some((ss / (n - 1) as f64).sqrt())
    }

    /// Z-score of `value` against the window with the deviation floored at `min_std`.
    #[must_use]
    pub fn z_score(&self, value: f64, min_std: f64) -> Option<f64> {
        let mean = self.mean()?;
        let std = self.std_dev()?.max(min_std);
        if std <= 0.0 {
            return None;
        }
        Some((value - mean) / std)
    }
}
