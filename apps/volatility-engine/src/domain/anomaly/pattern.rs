//! Tracked metrics, anomaly patterns and their trade direction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::surface::SurfaceMetrics;

/// Surface metric the detector tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Front-expiry ATM implied volatility.
    AtmIv,
    /// Put-wing minus call-wing IV.
    RiskReversal,
    /// Back ATM minus front ATM per year.
    TermSlope,
    /// Mean wing IV minus ATM IV.
    Butterfly,
}

impl MetricKind {
    /// All tracked metrics.
    pub const ALL: [Self; 4] = [
        Self::AtmIv,
        Self::RiskReversal,
        Self::TermSlope,
        Self::Butterfly,
    ];

    /// Extract this metric from a surface snapshot.
    #[must_use]
    pub const fn value(self, metrics: &SurfaceMetrics) -> Option<f64> {
        match self {
            Self::AtmIv => Some(metrics.atm_iv),
            Self::RiskReversal => Some(metrics.risk_reversal),
            Self::TermSlope => metrics.term_slope,
            Self::Butterfly => Some(metrics.butterfly),
        }
    }

    /// Pattern reported when this metric deviates.
    #[must_use]
    pub const fn pattern(self) -> AnomalyPattern {
        match self {
            Self::AtmIv => AnomalyPattern::MeanReversionSetup,
            Self::RiskReversal => AnomalyPattern::SkewBreak,
            Self::TermSlope => AnomalyPattern::TermStructureInversion,
            Self::Butterfly => AnomalyPattern::SmileCurvatureShift,
        }
    }
}

/// Closed set of anomaly patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPattern {
    /// ATM IV far from its baseline; expect reversion.
    MeanReversionSetup,
    /// Risk reversal broke from its baseline.
    SkewBreak,
    /// Term slope moved sharply (typically toward inversion).
    TermStructureInversion,
    /// Smile convexity changed.
    SmileCurvatureShift,
}

impl AnomalyPattern {
    /// Trade direction implied by a deviation with signed z-score `z`.
    ///
    /// | pattern | z < 0 | z > 0 |
    /// |---|---|---|
    /// | `MeanReversionSetup` | long vol | short vol |
    /// | `SkewBreak` | bearish | bullish |
    /// | `TermStructureInversion` | long vol | short vol |
    /// | `SmileCurvatureShift` | long vol | short vol |
    #[must_use]
    pub fn direction(self, z: f64) -> Direction {
        let rich = z > 0.0;
        match self {
            Self::SkewBreak => {
                if rich {
                    Direction::Bullish
                } else {
                    Direction::Bearish
                }
            }
            Self::MeanReversionSetup | Self::TermStructureInversion | Self::SmileCurvatureShift => {
                if rich {
                    Direction::ShortVolatility
                } else {
                    Direction::LongVolatility
                }
            }
        }
    }

    /// Stable label for metrics and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MeanReversionSetup => "mean_reversion_setup",
            Self::SkewBreak => "skew_break",
            Self::TermStructureInversion => "term_structure_inversion",
            Self::SmileCurvatureShift => "smile_curvature_shift",
        }
    }
}

impl fmt::Display for AnomalyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Suggested trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Expect the underlying to rise.
    Bullish,
    /// Expect the underlying to fall.
    Bearish,
    /// Expect implied volatility to rise.
    LongVolatility,
    /// Expect implied volatility to fall.
    ShortVolatility,
}

impl Direction {
    /// Whether the trade pays premium (long options) rather than collecting it.
    #[must_use]
    pub const fn buys_premium(self) -> bool {
        !matches!(self, Self::ShortVolatility)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::LongVolatility => "long_volatility",
            Self::ShortVolatility => "short_volatility",
        };
        f.write_str(s)
    }
}
