//! Premium context for an option buyer: how implied volatility prices
//! against realized volatility, and where ATM IV sits against its recent
//! moving averages.
//!
//! Both readings reduce to a signed buyer score. Positive favors buying
//! premium (cheap and rising IV), negative favors selling it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short moving-average window, in observations.
pub const ULTRA_SHORT_WINDOW: usize = 3;
/// Medium moving-average window, in observations.
pub const SHORT_WINDOW: usize = 5;
/// Long moving-average window; also the minimum history for a trend.
pub const LONG_WINDOW: usize = 10;

/// Implied against realized volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumValue {
    /// IV below 0.85 × HV.
    Cheap,
    /// IV below HV.
    BelowRealized,
    /// IV between 1.0 and 1.2 × HV.
    Fair,
    /// IV above 1.2 × HV.
    Rich,
    /// IV above 1.5 × HV.
    Expensive,
}

impl PremiumValue {
    /// Classify `implied / realized`. `None` unless both are positive and finite.
    #[must_use]
    pub fn classify(implied: f64, realized: f64) -> Option<Self> {
        if !(implied.is_finite() && realized.is_finite()) || implied <= 0.0 || realized <= 0.0 {
            return None;
        }
        let ratio = implied / realized;
        let value = if ratio < 0.85 {
            Self::Cheap
        } else if ratio < 1.0 {
            Self::BelowRealized
        } else if ratio > 1.5 {
            Self::Expensive
        } else if ratio > 1.2 {
            Self::Rich
        } else {
            Self::Fair
        };
        Some(value)
    }

    /// Buyer score contribution.
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::Cheap => 2.0,
            Self::BelowRealized => 1.0,
            Self::Fair => 0.0,
            Self::Rich => -1.0,
            Self::Expensive => -2.5,
        }
    }
}

/// Where the latest IV sits against its 3, 5 and 10 observation averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IvTrend {
    /// Rising, above every average, averages stacked upward.
    StrongUptrend,
    /// Above every average, averages stacked upward.
    Uptrend,
    /// Above the 5 and 10 averages, 5 above 10.
    ModerateUptrend,
    /// Above the 3 and 5 averages, 3 above 5.
    ShortTermUptrend,
    /// Above the 5 and 10 averages without ordered averages.
    AboveAverages,
    /// Above the 10 average only.
    AboveLongAverage,
    /// Above the 3 or 5 average only.
    AboveShortAverage,
    /// No relationship holds.
    Sideways,
    /// Below the 5 and 10 averages without ordered averages.
    BelowAverages,
    /// Below the 10 average only.
    BelowLongAverage,
    /// Below the 3 and 5 averages, 3 below 5.
    ShortTermDowntrend,
    /// Below the 5 and 10 averages, 5 below 10.
    ModerateDowntrend,
    /// Below every average, averages stacked downward.
    Downtrend,
    /// Falling, below every average, averages stacked downward.
    StrongDowntrend,
}

impl IvTrend {
    /// Buyer score contribution.
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::StrongUptrend => 3.0,
            Self::Uptrend => 2.5,
            Self::ModerateUptrend | Self::ShortTermUptrend => 2.0,
            Self::AboveAverages => 1.5,
            Self::AboveLongAverage
            | Self::AboveShortAverage
            | Self::Sideways
            | Self::BelowLongAverage => 0.0,
            Self::BelowAverages => -1.5,
            Self::ModerateDowntrend | Self::ShortTermDowntrend => -2.0,
            Self::Downtrend => -2.5,
            Self::StrongDowntrend => -3.0,
        }
    }

    /// IV is sliding below its averages.
    #[must_use]
    pub const fn is_falling(self) -> bool {
        matches!(
            self,
            Self::StrongDowntrend | Self::Downtrend | Self::BelowAverages
        )
    }
}

impl fmt::Display for IvTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StrongUptrend => "strong_uptrend",
            Self::Uptrend => "uptrend",
            Self::ModerateUptrend => "moderate_uptrend",
            Self::ShortTermUptrend => "short_term_uptrend",
            Self::AboveAverages => "above_averages",
            Self::AboveLongAverage => "above_long_average",
            Self::AboveShortAverage => "above_short_average",
            Self::Sideways => "sideways",
            Self::BelowAverages => "below_averages",
            Self::BelowLongAverage => "below_long_average",
            Self::ShortTermDowntrend => "short_term_downtrend",
            Self::ModerateDowntrend => "moderate_downtrend",
            Self::Downtrend => "downtrend",
            Self::StrongDowntrend => "strong_downtrend",
        };
        write!(f, "{s}")
    }
}

/// IV trend classification of the latest observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IvTrendReading {
    /// Trend state.
    pub trend: IvTrend,
    /// Latest IV above the 3 or the 5 observation average.
    pub above_short_average: bool,
    /// Latest IV above the previous observation.
    pub rising: bool,
}

impl IvTrendReading {
    /// Classify the last value of `series` (oldest first). Needs at least
    /// [`LONG_WINDOW`] observations.
    #[must_use]
    pub fn classify(series: &[f64]) -> Option<Self> {
        if series.len() < LONG_WINDOW || series.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let n = series.len();
        let current = series[n - 1];
        let previous = series[n - 2];
        let sma = |window: usize| series[n - window..].iter().sum::<f64>() / window as f64;
        let (u, s, l) = (sma(ULTRA_SHORT_WINDOW), sma(SHORT_WINDOW), sma(LONG_WINDOW));

        let trend = if current > previous && current > u && u > s && s > l {
            IvTrend::StrongUptrend
        } else if current > u && u > s && s > l {
            IvTrend::Uptrend
        } else if current > s && s > l {
            IvTrend::ModerateUptrend
        } else if current > u && u > s {
            IvTrend::ShortTermUptrend
        } else if current < previous && current < u && u < s && s < l {
            IvTrend::StrongDowntrend
        } else if current < u && u < s && s < l {
            IvTrend::Downtrend
        } else if current < s && s < l {
            IvTrend::ModerateDowntrend
        } else if current < u && u < s {
            IvTrend::ShortTermDowntrend
        } else if current > l && current > s {
            IvTrend::AboveAverages
        } else if current > l {
            IvTrend::AboveLongAverage
        } else if current > u || current > s {
            IvTrend::AboveShortAverage
        } else if current < l && current < s {
            IvTrend::BelowAverages
        } else if current < l {
            IvTrend::BelowLongAverage
        } else {
            IvTrend::Sideways
        };

        Some(Self {
            trend,
            above_short_average: current > u || current > s,
            rising: current > previous,
        })
    }

    /// Trend, short-average and momentum contributions combined.
    #[must_use]
    pub fn score(&self) -> f64 {
        let above = if self.above_short_average { 1.0 } else { -0.5 };
        let momentum = if self.rising { 2.0 } else { -1.5 };
        self.trend.score() + above + momentum
    }
}

/// Premium readings for one underlying at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolatilityContext {
    /// IV against realized volatility, when realized volatility is known.
    pub premium: Option<PremiumValue>,
    /// IV trend, once enough history exists.
    pub trend: Option<IvTrendReading>,
}

impl VolatilityContext {
    /// Build from the latest ATM IV, realized volatility and the IV trend.
    #[must_use]
    pub fn new(atm_iv: Option<f64>, realized_vol: Option<f64>, trend: Option<IvTrendReading>) -> Self {
        let premium = atm_iv.zip(realized_vol).and_then(|(iv, hv)| PremiumValue::classify(iv, hv));
        Self { premium, trend }
    }

    /// Signed score for buying premium. Zero when nothing is known.
    #[must_use]
    pub fn buyer_score(&self) -> f64 {
        let premium = self.premium.map_or(0.0, PremiumValue::score);
        let trend = self.trend.map_or(0.0, |t| t.score());
        // Cheap IV that keeps falling is a value trap.
        let trap = match (self.premium, self.trend) {
            (Some(PremiumValue::Cheap), Some(t)) if t.trend.is_falling() => -1.0,
            _ => 0.0,
        };
        premium + trend + trap
    }
}
