//! Position sizing rules.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How much capital a single trade may commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SizingRule {
    /// Commit a fixed fraction of equity.
    FixedFraction {
        /// Fraction of equity per trade.
        fraction: Decimal,
    },
    /// Fixed fraction scaled by `target_vol / realized_vol`, clamped to
    /// `[min_scale, max_scale]`.
    VolatilityAdjusted {
        /// Base fraction of equity per trade.
        fraction: Decimal,
        /// Annualized volatility the base fraction is calibrated for.
        target_vol: f64,
        /// Lower bound of the scale factor.
        min_scale: f64,
        /// Upper bound of the scale factor.
        max_scale: f64,
    },
}

impl Default for SizingRule {
    fn default() -> Self {
        Self::FixedFraction {
            fraction: dec!(0.02),
        }
    }
}

impl SizingRule {
    /// Scale applied to the base fraction. Without a realized estimate the
    /// unscaled fraction is used, still clamped.
    #[must_use]
    pub fn scale(&self, realized_vol: Option<f64>) -> f64 {
        match self {
            Self::FixedFraction { .. } => 1.0,
            Self::VolatilityAdjusted {
                target_vol,
                min_scale,
                max_scale,
                ..
            } => {
                let raw = match realized_vol {
                    Some(rv) if rv.is_finite() && rv > 0.0 => target_vol / rv,
                    _ => 1.0,
                };
                raw.clamp(*min_scale, *max_scale)
            }
        }
    }

    /// Capital budget for one trade.
    #[must_use]
    pub fn budget(&self, equity: Decimal, realized_vol: Option<f64>) -> Decimal {
        let fraction = match self {
            Self::FixedFraction { fraction } | Self::VolatilityAdjusted { fraction, .. } => {
                *fraction
            }
        };
        let scale = Decimal::from_f64(self.scale(realized_vol)).unwrap_or(Decimal::ONE);
        (equity * fraction * scale).max(Decimal::ZERO)
    }
}
