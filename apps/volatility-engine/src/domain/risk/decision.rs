//! Risk decisions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::{SignalId, UnderlyingId};

/// The constraint that caused a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskConstraint {
    /// Available capital below the cost of one unit.
    InsufficientCapital,
    /// Per-underlying exposure cap reached.
    UnderlyingExposure,
    /// Portfolio exposure cap reached.
    PortfolioExposure,
    /// Drawdown from peak equity at or beyond the ceiling.
    DrawdownCeiling,
    /// Equity below the capital-preservation floor; trading halted.
    CapitalPreservation,
    /// Sizing budget does not cover a single unit.
    SizingBudget,
    /// Signal has no legs or no positive entry price.
    InvalidSignal,
}

impl RiskConstraint {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InsufficientCapital => "insufficient capital",
            Self::UnderlyingExposure => "underlying exposure cap",
            Self::PortfolioExposure => "portfolio exposure cap",
            Self::DrawdownCeiling => "drawdown ceiling",
            Self::CapitalPreservation => "capital preservation floor",
            Self::SizingBudget => "sizing budget",
            Self::InvalidSignal => "invalid signal",
        }
    }
}

impl fmt::Display for RiskConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Approved size with exit levels and loss budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedTrade {
    /// Signal being approved.
    pub signal_id: SignalId,
    /// Underlying.
    pub underlying: UnderlyingId,
    /// Units of the structure (contracts per leg).
    pub quantity: u32,
    /// Premium per unit used for sizing.
    pub entry_price: Decimal,
    /// Premium level that closes the position at a loss.
    pub stop_loss: Decimal,
    /// Premium level that closes the position at a profit.
    pub take_profit: Option<Decimal>,
    /// Loss if the stop is hit.
    pub max_loss: Decimal,
    /// Capital committed: `quantity × entry_price × multiplier`.
    pub notional: Decimal,
}

/// Why a signal was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRejection {
    /// Signal being rejected.
    pub signal_id: SignalId,
    /// Failed constraint.
    pub constraint: RiskConstraint,
    /// Detail with observed and limit values.
    pub reason: String,
}

/// Outcome of a risk evaluation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RiskDecision {
    /// Trade may proceed at the given size.
    Approved(ApprovedTrade),
    /// Trade refused.
    Rejected(RiskRejection),
}

impl RiskDecision {
    pub(crate) fn reject(
        signal_id: &SignalId,
        constraint: RiskConstraint,
        reason: impl Into<String>,
    ) -> Self {
        Self::Rejected(RiskRejection {
            signal_id: signal_id.clone(),
            constraint,
            reason: reason.into(),
        })
    }

    /// Whether the trade was approved.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved(_))
    }

    /// Approved size, or zero when rejected.
    #[must_use]
    pub const fn size(&self) -> u32 {
        match self {
            Self::Approved(trade) => trade.quantity,
            Self::Rejected(_) => 0,
        }
    }

    /// Signal the decision refers to.
    #[must_use]
    pub const fn signal_id(&self) -> &SignalId {
        match self {
            Self::Approved(trade) => &trade.signal_id,
            Self::Rejected(rejection) => &rejection.signal_id,
        }
    }

    /// Failed constraint, if rejected.
    #[must_use]
    pub const fn constraint(&self) -> Option<RiskConstraint> {
        match self {
            Self::Approved(_) => None,
            Self::Rejected(rejection) => Some(rejection.constraint),
        }
    }
}
