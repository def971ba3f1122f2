//! Position entity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::order::{OrderPurpose, OrderSide};
use crate::domain::risk::exit_levels;
use crate::domain::shared::{OptionContract, PositionId, SignalId, Timestamp};

/// Position lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// Entry order working, nothing filled yet.
    Pending,
    /// Holds a non-zero quantity.
    Open,
    /// Flat and archived.
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Why a position is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Premium crossed the stop-loss level.
    StopLoss,
    /// Premium crossed the take-profit level.
    TakeProfit,
    /// Days to expiry at or below the time-stop threshold.
    TimeStop,
}

impl ExitReason {
    /// Order purpose for the closing order.
    #[must_use]
    pub const fn purpose(self) -> OrderPurpose {
        match self {
            Self::StopLoss => OrderPurpose::StopLoss,
            Self::TakeProfit => OrderPurpose::TakeProfit,
            Self::TimeStop => OrderPurpose::TimeStop,
        }
    }
}

/// Exit condition detected for an open position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitTrigger {
    /// Position to close.
    pub position_id: PositionId,
    /// Instrument held.
    pub contract: OptionContract,
    /// Side of the closing order.
    pub side: OrderSide,
    /// Quantity to close.
    pub quantity: u32,
    /// Trigger reason.
    pub reason: ExitReason,
    /// Mark that fired the trigger.
    pub mark: Decimal,
}

/// One instrument held on behalf of a trade signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    id: PositionId,
    signal_id: SignalId,
    contract: OptionContract,
    side: OrderSide,
    target_qty: u32,
    quantity: u32,
    entry_qty: u32,
    avg_entry_price: Decimal,
    stop_loss_pct: Decimal,
    take_profit_pct: Option<Decimal>,
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
    realized_pnl: Decimal,
    status: PositionStatus,
    exit_pending: bool,
    opened_at: Timestamp,
    closed_at: Option<Timestamp>,
}

impl Position {
    pub(crate) fn pending(
        signal_id: SignalId,
        contract: OptionContract,
        side: OrderSide,
        target_qty: u32,
        stop_loss_pct: Decimal,
        take_profit_pct: Option<Decimal>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PositionId::generate(),
            signal_id,
            contract,
            side,
            target_qty,
            quantity: 0,
            entry_qty: 0,
            avg_entry_price: Decimal::ZERO,
            stop_loss_pct,
            take_profit_pct,
            stop_loss: None,
            take_profit: None,
            realized_pnl: Decimal::ZERO,
            status: PositionStatus::Pending,
            exit_pending: false,
            opened_at: now,
            closed_at: None,
        }
    }

    /// Position id.
    #[must_use]
    pub const fn id(&self) -> &PositionId {
        &self.id
    }

    /// Owning trade signal.
    #[must_use]
    pub const fn signal_id(&self) -> &SignalId {
        &self.signal_id
    }

    /// Instrument.
    #[must_use]
    pub const fn contract(&self) -> &OptionContract {
        &self.contract
    }

    /// Opening side; `Buy` is long premium.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Quantity the entry order targets.
    #[must_use]
    pub const fn target_qty(&self) -> u32 {
        self.target_qty
    }

    /// Open quantity.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Quantity filled on entry so far.
    #[must_use]
    pub const fn entry_qty(&self) -> u32 {
        self.entry_qty
    }

    /// Volume-weighted entry premium.
    #[must_use]
    pub const fn avg_entry_price(&self) -> Decimal {
        self.avg_entry_price
    }

    /// Stop-loss premium level, once filled.
    #[must_use]
    pub const fn stop_loss(&self) -> Option<Decimal> {
        self.stop_loss
    }

    /// Take-profit premium level, if configured and filled.
    #[must_use]
    pub const fn take_profit(&self) -> Option<Decimal> {
        self.take_profit
    }

    /// Realized P&L from closes so far.
    #[must_use]
    pub const fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> PositionStatus {
        self.status
    }

    /// Whether a closing order is working.
    #[must_use]
    pub const fn exit_pending(&self) -> bool {
        self.exit_pending
    }

    /// Creation time.
    #[must_use]
    pub const fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    /// Close time.
    #[must_use]
    pub const fn closed_at(&self) -> Option<Timestamp> {
        self.closed_at
    }

    /// Signed open quantity: positive long, negative short.
    #[must_use]
    pub fn signed_quantity(&self) -> i64 {
        self.side.sign() * i64::from(self.quantity)
    }

    /// Premium committed: `quantity × avg entry × multiplier`.
    #[must_use]
    pub fn cost_basis(&self, multiplier: Decimal) -> Decimal {
        Decimal::from(self.quantity) * self.avg_entry_price * multiplier
    }

    pub(crate) fn add_entry(&mut self, quantity: u32, price: Decimal) {
        let old_value = self.avg_entry_price * Decimal::from(self.quantity);
        self.quantity += quantity;
        self.entry_qty += quantity;
        self.avg_entry_price =
            (old_value + price * Decimal::from(quantity)) / Decimal::from(self.quantity);
        let (stop, tp) = exit_levels(
            self.side,
            self.avg_entry_price,
            self.stop_loss_pct,
            self.take_profit_pct,
        );
        self.stop_loss = Some(stop);
        self.take_profit = tp;
        self.status = PositionStatus::Open;
        self.closed_at = None;
    }

    /// Reduce by `quantity` at `price`; returns the realized P&L of the slice.
    pub(crate) fn reduce(&mut self, quantity: u32, price: Decimal, multiplier: Decimal, now: Timestamp) -> Decimal {
        let per_unit = match self.side {
            OrderSide::Buy => price - self.avg_entry_price,
            OrderSide::Sell => self.avg_entry_price - price,
        };
        let pnl = per_unit * Decimal::from(quantity) * multiplier;
        self.quantity -= quantity;
        self.realized_pnl += pnl;
        if self.quantity == 0 {
            self.close(now);
        }
        pnl
    }

    pub(crate) fn close(&mut self, now: Timestamp) {
        self.status = PositionStatus::Closed;
        self.exit_pending = false;
        self.closed_at = Some(now);
    }

    pub(crate) const fn set_exit_pending(&mut self, pending: bool) {
        self.exit_pending = pending;
    }

    /// Exit condition at `mark`, following the stop/target rules for the
    /// position's direction, then the time stop.
    #[must_use]
    pub fn exit_reason(
        &self,
        mark: Decimal,
        now: Timestamp,
        time_stop_dte: Option<f64>,
    ) -> Option<ExitReason> {
        if self.status != PositionStatus::Open || self.exit_pending {
            return None;
        }
        let hit_stop = self.stop_loss.is_some_and(|stop| match self.side {
            OrderSide::Buy => mark <= stop,
            OrderSide::Sell => mark >= stop,
        });
        if hit_stop {
            return Some(ExitReason::StopLoss);
        }
        let hit_target = self.take_profit.is_some_and(|tp| match self.side {
            OrderSide::Buy => mark >= tp,
            OrderSide::Sell => mark <= tp,
        });
        if hit_target {
            return Some(ExitReason::TakeProfit);
        }
        if time_stop_dte.is_some_and(|dte| self.contract.days_to_expiry(now) <= dte) {
            return Some(ExitReason::TimeStop);
        }
        None
    }
}
