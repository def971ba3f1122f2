//! Reasons a quote is left out of a surface.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{IvError, OptionQuote};

/// Why a quote was excluded from the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Quote belongs to a different underlying than the batch.
    WrongUnderlying,
    /// Bid or ask is zero/negative, or bid exceeds ask.
    InvalidBidAsk,
    /// Contract has expired as of the batch time.
    Expired,
    /// Relative spread is wider than the configured maximum.
    SpreadTooWide {
        /// Observed (ask - bid) / mid.
        relative_spread: f64,
    },
    /// Volume or open interest below the configured minimum.
    Illiquid,
    /// Days to expiry outside the configured window.
    DteOutOfRange {
        /// Observed days to expiry.
        days: f64,
    },
    /// Implied volatility inversion failed.
    IvFailure {
        /// Solver error description.
        cause: String,
    },
}

impl ExclusionReason {
    /// Short label used for metrics and audit.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::WrongUnderlying => "wrong_underlying",
            Self::InvalidBidAsk => "invalid_bid_ask",
            Self::Expired => "expired",
            Self::SpreadTooWide { .. } => "spread_too_wide",
            Self::Illiquid => "illiquid",
            Self::DteOutOfRange { .. } => "dte_out_of_range",
            Self::IvFailure { .. } => "iv_failure",
        }
    }
}

impl From<IvError> for ExclusionReason {
    fn from(err: IvError) -> Self {
        Self::IvFailure {
            cause: err.to_string(),
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpreadTooWide { relative_spread } => {
                write!(f, "spread_too_wide ({relative_spread:.3})")
            }
            Self::DteOutOfRange { days } => write!(f, "dte_out_of_range ({days:.1}d)"),
            Self::IvFailure { cause } => write!(f, "iv_failure ({cause})"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// A quote that was dropped, with its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedQuote {
    /// The offending quote.
    pub quote: OptionQuote,
    /// Why it was dropped.
    pub reason: ExclusionReason,
}
