//! Capital account and portfolio snapshots.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{SignalId, UnderlyingId};

/// Point-in-time view of capital and exposure used by risk checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Starting capital plus realized P&L.
    pub equity: Decimal,
    /// Highest equity observed.
    pub peak_equity: Decimal,
    /// Capital the account started with.
    pub initial_equity: Decimal,
    /// Equity not committed to open positions or reservations.
    pub available_capital: Decimal,
    /// Committed capital per underlying.
    pub underlying_exposure: HashMap<UnderlyingId, Decimal>,
}

impl PortfolioSnapshot {
    /// Committed capital on `underlying`.
    #[must_use]
    pub fn exposure_for(&self, underlying: &UnderlyingId) -> Decimal {
        self.underlying_exposure
            .get(underlying)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Committed capital across the portfolio.
    #[must_use]
    pub fn total_exposure(&self) -> Decimal {
        self.underlying_exposure.values().copied().sum()
    }

    /// Fractional decline of equity from its peak.
    #[must_use]
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.peak_equity - self.equity) / self.peak_equity).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Reservation {
    underlying: UnderlyingId,
    amount: Decimal,
}

/// Equity bookkeeping plus capital reserved for approved signals whose
/// entries are still working.
#[derive(Debug, Clone)]
pub struct CapitalAccount {
    initial_equity: Decimal,
    realized_pnl: Decimal,
    peak_equity: Decimal,
    reservations: HashMap<SignalId, Reservation>,
}

impl CapitalAccount {
    /// Open an account with starting capital.
    #[must_use]
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            initial_equity,
            realized_pnl: Decimal::ZERO,
            peak_equity: initial_equity,
            reservations: HashMap::new(),
        }
    }

    /// Starting capital plus realized P&L.
    #[must_use]
    pub fn equity(&self) -> Decimal {
        self.initial_equity + self.realized_pnl
    }

    /// Record realized P&L and update the peak.
    pub fn realize(&mut self, pnl: Decimal) {
        self.realized_pnl += pnl;
        self.peak_equity = self.peak_equity.max(self.equity());
    }

    /// Reserve capital for an approved signal.
    pub fn reserve(&mut self, signal_id: SignalId, underlying: UnderlyingId, amount: Decimal) {
        self.reservations.insert(signal_id, Reservation { underlying, amount });
    }

    /// Release a reservation. Returns the amount released.
    pub fn release(&mut self, signal_id: &SignalId) -> Option<Decimal> {
        self.reservations.remove(signal_id).map(|r| r.amount)
    }

    /// Whether the signal still holds a reservation.
    #[must_use]
    pub fn is_reserved(&self, signal_id: &SignalId) -> bool {
        self.reservations.contains_key(signal_id)
    }

    /// Build a snapshot from committed position capital, keyed by underlying.
    /// Positions belonging to a reserved signal must be excluded by the caller;
    /// the reservation stands in for them.
    #[must_use]
    pub fn snapshot(&self, committed: HashMap<UnderlyingId, Decimal>) -> PortfolioSnapshot {
        let mut exposure = committed;
        for r in self.reservations.values() {
            *exposure.entry(r.underlying.clone()).or_insert(Decimal::ZERO) += r.amount;
        }
        let equity = self.equity();
        let total: Decimal = exposure.values().copied().sum();
        PortfolioSnapshot {
            equity,
            peak_equity: self.peak_equity,
            initial_equity: self.initial_equity,
            available_capital: (equity - total).max(Decimal::ZERO),
            underlying_exposure: exposure,
        }
    }
}
