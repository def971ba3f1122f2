//! Aggregation rule table: pattern weights and confidence.

use crate::config::PatternWeights;
use crate::domain::anomaly::{AnomalyPattern, AnomalySignal, Direction, VolatilityContext};

/// Weight per pattern, the scale turning weighted magnitude into confidence,
/// and the weight of the premium context.
#[derive(Debug, Clone)]
pub struct RuleTable {
    weights: PatternWeights,
    confidence_scale: f64,
    context_weight: f64,
}

impl RuleTable {
    /// Create a rule table that ignores premium context.
    #[must_use]
    pub const fn new(weights: PatternWeights, confidence_scale: f64) -> Self {
        Self {
            weights,
            confidence_scale,
            context_weight: 0.0,
        }
    }

    /// Confidence shift per point of buyer score.
    #[must_use]
    pub const fn with_context_weight(mut self, context_weight: f64) -> Self {
        self.context_weight = context_weight;
        self
    }

    /// Weight applied to anomalies of `pattern`.
    #[must_use]
    pub const fn weight(&self, pattern: AnomalyPattern) -> f64 {
        match pattern {
            AnomalyPattern::MeanReversionSetup => self.weights.mean_reversion_setup,
            AnomalyPattern::SkewBreak => self.weights.skew_break,
            AnomalyPattern::TermStructureInversion => self.weights.term_structure_inversion,
            AnomalyPattern::SmileCurvatureShift => self.weights.smile_curvature_shift,
        }
    }

    /// `min(1, Σ weight·|z| / scale)`.
    #[must_use]
    pub fn confidence<'a>(&self, anomalies: impl IntoIterator<Item = &'a AnomalySignal>) -> f64 {
        let weighted: f64 = anomalies
            .into_iter()
            .map(|a| self.weight(a.pattern) * a.magnitude.abs())
            .sum();
        (weighted / self.confidence_scale).clamp(0.0, 1.0)
    }

    /// Shift `confidence` by the premium context: a good buyer score raises
    /// premium-buying directions and lowers short volatility, and vice versa.
    #[must_use]
    pub fn adjust(&self, confidence: f64, direction: Direction, context: &VolatilityContext) -> f64 {
        let sign = if direction.buys_premium() { 1.0 } else { -1.0 };
        (confidence + sign * self.context_weight * context.buyer_score()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::anomaly::{IvTrendReading, MetricKind};
    use crate::testing::{anomaly, as_of};
    use test_case::test_case;

    fn table() -> RuleTable {
        RuleTable::new(PatternWeights::default(), 8.0)
    }

    #[test_case(MetricKind::AtmIv, 4.0, 0.5 ; "atm iv at full weight")]
    #[test_case(MetricKind::RiskReversal, -4.0, 0.4 ; "skew uses magnitude")]
    #[test_case(MetricKind::Butterfly, 4.0, 0.25 ; "curvature is lightest")]
    fn single_anomaly_confidence(metric: MetricKind, z: f64, expected: f64) {
        let a = anomaly(metric, z, as_of());
        assert!((table().confidence([&a]) - expected).abs() < 1e-12);
    }

    #[test]
    fn corroborating_anomalies_add_up() {
        let a = anomaly(MetricKind::AtmIv, 4.0, as_of());
        let b = anomaly(MetricKind::TermSlope, 4.0, as_of());
        assert!((table().confidence([&a, &b]) - 0.85).abs() < 1e-12);
    }

    fn cheap_and_rising() -> VolatilityContext {
        let series: Vec<f64> = (0..10).map(|i| 0.10 + 0.005 * f64::from(i)).collect();
        VolatilityContext::new(Some(0.145), Some(0.20), IvTrendReading::classify(&series))
    }

    #[test_case(Direction::LongVolatility, 0.9 ; "buyer gains")]
    #[test_case(Direction::Bullish, 0.9 ; "long calls gain")]
    #[test_case(Direction::ShortVolatility, 0.1 ; "seller loses")]
    fn context_shifts_confidence(direction: Direction, expected: f64) {
        let table = table().with_context_weight(0.05);
        // Cheap (+2) plus a strong rise (+6).
        let adjusted = table.adjust(0.5, direction, &cheap_and_rising());
        assert!((adjusted - expected).abs() < 1e-9);
    }

    #[test]
    fn context_is_ignored_without_weight() {
        assert_eq!(table().adjust(0.5, Direction::Bullish, &cheap_and_rising()), 0.5);
        let weighted = table().with_context_weight(0.05);
        assert_eq!(
            weighted.adjust(0.5, Direction::Bullish, &VolatilityContext::default()),
            0.5
        );
    }

    #[test]
    fn confidence_saturates_at_one() {
        let a = anomaly(MetricKind::AtmIv, 20.0, as_of());
        assert_eq!(table().confidence([&a]), 1.0);
        assert_eq!(table().confidence(std::iter::empty()), 0.0);
    }
}
