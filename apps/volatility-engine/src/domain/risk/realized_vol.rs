//! Realized volatility from spot observations.

use std::collections::VecDeque;

/// Annualized standard deviation of log returns over a fixed window of closes.
#[derive(Debug, Clone)]
pub struct RealizedVolatility {
    window: usize,
    periods_per_year: f64,
    closes: VecDeque<f64>,
}

impl RealizedVolatility {
    /// `window` returns need `window + 1` closes.
    #[must_use]
    pub fn new(window: usize, periods_per_year: f64) -> Self {
        Self {
            window,
            periods_per_year,
            closes: VecDeque::with_capacity(window + 1),
        }
    }

    /// Record a spot observation. Non-positive or non-finite values are ignored.
    pub fn push(&mut self, spot: f64) {
        if !spot.is_finite() || spot <= 0.0 {
            return;
        }
        if self.closes.len() == self.window + 1 {
            self.closes.pop_front();
        }
        self.closes.push_back(spot);
    }

    /// Number of closes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// Whether no closes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Annualized estimate, once at least two returns are available.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        if self.closes.len() < 3 {
            return None;
        }
        let returns: Vec<f64> = self
            .closes
            .iter()
            .zip(self.closes.iter().skip(1))
            .map(|(a, b)| (b / a).ln())
            .collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some((var * self.periods_per_year).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_two_returns() {
        let mut rv = RealizedVolatility::new(20, 252.0);
        rv.push(100.0);
        rv.push(101.0);
        assert!(rv.value().is_none());
        rv.push(100.0);
        assert!(rv.value().is_some());
    }

    #[test]
    fn constant_spot_has_zero_vol() {
        let mut rv = RealizedVolatility::new(5, 252.0);
        for _ in 0..10 {
            rv.push(50.0);
        }
        assert_eq!(rv.len(), 6);
        assert!(rv.value().unwrap().abs() < 1e-12);
    }

    #[test]
    fn alternating_returns_annualize() {
        let mut rv = RealizedVolatility::new(4, 252.0);
        for s in [100.0, 101.0, 100.0, 101.0, 100.0] {
            rv.push(s);
        }
        let r = (101.0_f64 / 100.0).ln();
        let expected = (4.0 * r * r / 3.0 * 252.0).sqrt();
        assert!((rv.value().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn ignores_bad_spots() {
        let mut rv = RealizedVolatility::new(5, 252.0);
        rv.push(f64::NAN);
        rv.push(-1.0);
        assert!(rv.is_empty());
    }
}
