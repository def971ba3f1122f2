//! Position ledger: fill application, P&L and consistency checks.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;

use super::errors::LedgerError;
use super::position::{ExitTrigger, Position, PositionStatus};
use crate::domain::order::{OrderPurpose, OrderSide};
use crate::domain::shared::{
    FillId, OptionContract, PositionId, SignalId, Timestamp, UnderlyingId,
};

/// A fill routed to the position its order belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFill {
    /// Broker fill id; applied at most once.
    pub fill_id: FillId,
    /// Target position.
    pub position_id: PositionId,
    /// Side of the order that filled.
    pub side: OrderSide,
    /// Entry or exit.
    pub purpose: OrderPurpose,
    /// Filled contracts.
    pub quantity: u32,
    /// Fill price.
    pub price: Decimal,
    /// Fill time.
    pub timestamp: Timestamp,
}

/// Result of applying a fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// Fill booked.
    Applied {
        /// Position after the fill.
        position: Position,
        /// P&L realized by this fill.
        realized: Decimal,
    },
    /// Fill id seen before; nothing changed.
    Duplicate,
}

/// Consistent copy of ledger state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSnapshot {
    /// Pending and open positions.
    pub open: Vec<Position>,
    /// Archived positions.
    pub closed: Vec<Position>,
    /// Realized P&L across all positions.
    pub realized_pnl: Decimal,
    /// Halted instruments with the violation that halted them.
    pub halted: Vec<(OptionContract, String)>,
}

/// Book of positions keyed by id. Open quantity per instrument always equals
/// the net of applied fills; a mismatch halts the instrument.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    multiplier: Decimal,
    open: HashMap<PositionId, Position>,
    closed: Vec<Position>,
    applied_fills: HashSet<FillId>,
    fill_net: HashMap<OptionContract, i64>,
    halted: HashMap<OptionContract, String>,
    realized_pnl: Decimal,
}

impl PositionLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new(multiplier: Decimal) -> Self {
        Self {
            multiplier,
            open: HashMap::new(),
            closed: Vec::new(),
            applied_fills: HashSet::new(),
            fill_net: HashMap::new(),
            halted: HashMap::new(),
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Contract multiplier.
    #[must_use]
    pub const fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    /// Fails if the instrument is halted.
    ///
    /// # Errors
    ///
    /// Returns `InstrumentHalted`.
    pub fn ensure_tradable(&self, contract: &OptionContract) -> Result<(), LedgerError> {
        match self.halted.get(contract) {
            Some(reason) => Err(LedgerError::InstrumentHalted {
                contract: contract.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Whether the instrument is halted.
    #[must_use]
    pub fn is_halted(&self, contract: &OptionContract) -> bool {
        self.halted.contains_key(contract)
    }

    /// Lift a halt after manual review.
    pub fn clear_halt(&mut self, contract: &OptionContract) -> bool {
        let cleared = self.halted.remove(contract).is_some();
        if cleared {
            tracing::warn!(contract = %contract, "Instrument halt cleared");
        }
        cleared
    }

    /// Open a pending position for an entry order.
    ///
    /// # Errors
    ///
    /// Returns `InstrumentHalted` if the instrument is halted.
    #[allow(clippy::too_many_arguments)]
    pub fn open_pending(
        &mut self,
        signal_id: SignalId,
        contract: OptionContract,
        side: OrderSide,
        target_qty: u32,
        stop_loss_pct: Decimal,
        take_profit_pct: Option<Decimal>,
        now: Timestamp,
    ) -> Result<PositionId, LedgerError> {
        self.ensure_tradable(&contract)?;
        let position = Position::pending(
            signal_id,
            contract,
            side,
            target_qty,
            stop_loss_pct,
            take_profit_pct,
            now,
        );
        let id = position.id().clone();
        self.open.insert(id.clone(), position);
        Ok(id)
    }

    /// Archive a pending position whose entry ended without fills.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is unknown or already holds quantity.
    pub fn abandon_pending(
        &mut self,
        position_id: &PositionId,
        now: Timestamp,
    ) -> Result<(), LedgerError> {
        let position = self.open_position(position_id)?;
        if position.status() != PositionStatus::Pending {
            return Err(LedgerError::InvalidState {
                position_id: position_id.clone(),
                operation: "abandon",
                status: position.status().to_string(),
            });
        }
        if let Some(mut position) = self.open.remove(position_id) {
            position.close(now);
            self.closed.push(position);
        }
        Ok(())
    }

    /// Flag a closing order as working and return the quantity to close.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is not open or already exiting.
    pub fn begin_exit(&mut self, position_id: &PositionId) -> Result<u32, LedgerError> {
        let position = self
            .open
            .get_mut(position_id)
            .ok_or_else(|| LedgerError::UnknownPosition {
                position_id: position_id.clone(),
            })?;
        if position.status() != PositionStatus::Open || position.exit_pending() {
            return Err(LedgerError::InvalidState {
                position_id: position_id.clone(),
                operation: "begin exit",
                status: position.status().to_string(),
            });
        }
        position.set_exit_pending(true);
        Ok(position.quantity())
    }

    /// Clear the exit flag after a closing order ended without closing.
    pub fn cancel_exit(&mut self, position_id: &PositionId) {
        if let Some(position) = self.open.get_mut(position_id) {
            position.set_exit_pending(false);
        }
    }

    /// Whether any position on `contract` has a closing order working.
    #[must_use]
    pub fn exit_pending_for(&self, contract: &OptionContract) -> bool {
        self.open
            .values()
            .any(|p| p.contract() == contract && p.exit_pending())
    }

    /// Book a fill.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPosition` for an unknown id. Returns
    /// `InvariantViolation` and halts the instrument if the fill contradicts
    /// the position (wrong side, closing more than is open) or if open
    /// quantity no longer matches the net of fills.
    pub fn apply_fill(&mut self, fill: &LedgerFill) -> Result<LedgerOutcome, LedgerError> {
        if self.applied_fills.contains(&fill.fill_id) {
            return Ok(LedgerOutcome::Duplicate);
        }

        if !self.open.contains_key(&fill.position_id) {
            // A late entry fill revives a position abandoned after cancel.
            let idx = self
                .closed
                .iter()
                .position(|p| p.id() == &fill.position_id)
                .ok_or_else(|| LedgerError::UnknownPosition {
                    position_id: fill.position_id.clone(),
                })?;
            if !fill.purpose.is_entry() {
                let contract = self.closed[idx].contract().clone();
                return Err(self.violation(contract, format!(
                    "exit fill {} against closed position {}",
                    fill.fill_id, fill.position_id
                )));
            }
            let position = self.closed.remove(idx);
            self.open.insert(position.id().clone(), position);
        }

        let multiplier = self.multiplier;
        let (held_side, open_qty, contract) = {
            let position = self.open_position(&fill.position_id)?;
            (position.side(), position.quantity(), position.contract().clone())
        };
        let expected_side = if fill.purpose.is_entry() {
            held_side
        } else {
            held_side.opposite()
        };
        if fill.side != expected_side {
            return Err(self.violation(contract, format!(
                "{} fill {} on {} side for a {held_side} position",
                fill.purpose, fill.fill_id, fill.side
            )));
        }
        if fill.purpose.is_exit() && fill.quantity > open_qty {
            return Err(self.violation(contract, format!(
                "exit fill {} of {} exceeds open quantity {open_qty}",
                fill.fill_id, fill.quantity
            )));
        }

        let Some(position) = self.open.get_mut(&fill.position_id) else {
            return Err(LedgerError::UnknownPosition {
                position_id: fill.position_id.clone(),
            });
        };
        let realized = if fill.purpose.is_entry() {
            position.add_entry(fill.quantity, fill.price);
            Decimal::ZERO
        } else {
            position.reduce(fill.quantity, fill.price, multiplier, fill.timestamp)
        };
        let snapshot = position.clone();

        self.applied_fills.insert(fill.fill_id.clone());
        *self.fill_net.entry(contract.clone()).or_insert(0) +=
            fill.side.sign() * i64::from(fill.quantity);
        self.realized_pnl += realized;

        if snapshot.status() == PositionStatus::Closed
            && let Some(closed) = self.open.remove(&fill.position_id)
        {
            self.closed.push(closed);
        }

        let net = self.net_quantity(&contract);
        let expected = self.fill_net.get(&contract).copied().unwrap_or(0);
        if net != expected {
            return Err(self.violation(
                contract,
                format!("open quantity {net} differs from net fills {expected}"),
            ));
        }

        tracing::debug!(
            position_id = %snapshot.id(),
            contract = %contract,
            fill_id = %fill.fill_id,
            quantity = snapshot.quantity(),
            realized = %realized,
            "Fill booked"
        );
        Ok(LedgerOutcome::Applied {
            position: snapshot,
            realized,
        })
    }

    fn open_position(&self, position_id: &PositionId) -> Result<&Position, LedgerError> {
        self.open
            .get(position_id)
            .ok_or_else(|| LedgerError::UnknownPosition {
                position_id: position_id.clone(),
            })
    }

    fn violation(&mut self, contract: OptionContract, detail: String) -> LedgerError {
        tracing::error!(contract = %contract, detail = %detail, "Ledger invariant violated, halting instrument");
        self.halted.insert(contract.clone(), detail.clone());
        LedgerError::InvariantViolation { contract, detail }
    }

    /// Net signed open quantity across positions on `contract`.
    #[must_use]
    pub fn net_quantity(&self, contract: &OptionContract) -> i64 {
        self.open
            .values()
            .filter(|p| p.contract() == contract)
            .map(Position::signed_quantity)
            .sum()
    }

    /// Position by id, open or archived.
    #[must_use]
    pub fn position(&self, position_id: &PositionId) -> Option<&Position> {
        self.open
            .get(position_id)
            .or_else(|| self.closed.iter().find(|p| p.id() == position_id))
    }

    /// Pending and open positions.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    /// Archived positions.
    #[must_use]
    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    /// Realized P&L across all positions.
    #[must_use]
    pub const fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    /// Capital committed to open positions per underlying, skipping positions
    /// of signals for which `skip` returns true.
    #[must_use]
    pub fn committed_by_underlying(
        &self,
        skip: impl Fn(&SignalId) -> bool,
    ) -> HashMap<UnderlyingId, Decimal> {
        let mut out: HashMap<UnderlyingId, Decimal> = HashMap::new();
        for p in self.open.values().filter(|p| !skip(p.signal_id())) {
            *out.entry(p.contract().underlying.clone()).or_insert(Decimal::ZERO) +=
                p.cost_basis(self.multiplier);
        }
        out
    }

    /// Exit triggers for open positions on `contract` at `mark`.
    #[must_use]
    pub fn check_exits(
        &self,
        contract: &OptionContract,
        mark: Decimal,
        now: Timestamp,
        time_stop_dte: Option<f64>,
    ) -> Vec<ExitTrigger> {
        self.open
            .values()
            .filter(|p| p.contract() == contract)
            .filter_map(|p| {
                p.exit_reason(mark, now, time_stop_dte).map(|reason| ExitTrigger {
                    position_id: p.id().clone(),
                    contract: contract.clone(),
                    side: p.side().opposite(),
                    quantity: p.quantity(),
                    reason,
                    mark,
                })
            })
            .collect()
    }

    /// Consistent copy of the whole ledger.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            open: self.open.values().cloned().collect(),
            closed: self.closed.clone(),
            realized_pnl: self.realized_pnl,
            halted: self
                .halted
                .iter()
                .map(|(c, r)| (c.clone(), r.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::ExitReason;
    use crate::domain::shared::OptionKind;
    use crate::testing::as_of;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn contract() -> OptionContract {
        OptionContract::new(
            "SPY".into(),
            dec!(100),
            as_of().plus(Duration::days(30)),
            OptionKind::Call,
        )
    }

    fn ledger_with_long(target: u32) -> (PositionLedger, PositionId) {
        let mut ledger = PositionLedger::new(dec!(100));
        let id = ledger
            .open_pending(
                SignalId::new("sig"),
                contract(),
                OrderSide::Buy,
                target,
                dec!(0.5),
                Some(dec!(1.0)),
                as_of(),
            )
            .unwrap();
        (ledger, id)
    }

    fn fill(id: &str, position: &PositionId, side: OrderSide, purpose: OrderPurpose, qty: u32, price: Decimal) -> LedgerFill {
        LedgerFill {
            fill_id: FillId::new(id),
            position_id: position.clone(),
            side,
            purpose,
            quantity: qty,
            price,
            timestamp: as_of(),
        }
    }

    #[test]
    fn entry_fills_open_and_set_levels() {
        let (mut ledger, id) = ledger_with_long(10);
        assert_eq!(ledger.position(&id).unwrap().status(), PositionStatus::Pending);

        ledger.apply_fill(&fill("f1", &id, OrderSide::Buy, OrderPurpose::Entry, 4, dec!(2.00))).unwrap();
        ledger.apply_fill(&fill("f2", &id, OrderSide::Buy, OrderPurpose::Entry, 6, dec!(2.50))).unwrap();

        let p = ledger.position(&id).unwrap();
        assert_eq!(p.status(), PositionStatus::Open);
        assert_eq!(p.quantity(), 10);
        assert_eq!(p.avg_entry_price(), dec!(2.30));
        assert_eq!(p.stop_loss(), Some(dec!(1.15)));
        assert_eq!(p.take_profit(), Some(dec!(4.60)));
        assert_eq!(ledger.net_quantity(&contract()), 10);
        assert_eq!(p.cost_basis(dec!(100)), dec!(2300));
    }

    #[test]
    fn partial_close_realizes_proportionally() {
        let (mut ledger, id) = ledger_with_long(10);
        ledger.apply_fill(&fill("f1", &id, OrderSide::Buy, OrderPurpose::Entry, 10, dec!(2))).unwrap();
        let out = ledger
            .apply_fill(&fill("x1", &id, OrderSide::Sell, OrderPurpose::TakeProfit, 4, dec!(3)))
            .unwrap();

        let LedgerOutcome::Applied { realized, position } = out else {
            panic!("expected applied");
        };
        assert_eq!(realized, dec!(400));
        assert_eq!(position.quantity(), 6);
        assert_eq!(position.status(), PositionStatus::Open);

        ledger.apply_fill(&fill("x2", &id, OrderSide::Sell, OrderPurpose::TakeProfit, 6, dec!(1))).unwrap();
        let p = ledger.position(&id).unwrap();
        assert_eq!(p.status(), PositionStatus::Closed);
        assert_eq!(p.realized_pnl(), dec!(-200));
        assert_eq!(ledger.realized_pnl(), dec!(-200));
        assert_eq!(ledger.closed_positions().len(), 1);
        assert_eq!(ledger.net_quantity(&contract()), 0);
    }

    #[test]
    fn short_position_profits_when_premium_falls() {
        let mut ledger = PositionLedger::new(dec!(100));
        let id = ledger
            .open_pending(SignalId::new("s"), contract(), OrderSide::Sell, 2, dec!(0.5), None, as_of())
            .unwrap();
        ledger.apply_fill(&fill("e", &id, OrderSide::Sell, OrderPurpose::Entry, 2, dec!(4))).unwrap();
        assert_eq!(ledger.net_quantity(&contract()), -2);
        assert_eq!(ledger.position(&id).unwrap().stop_loss(), Some(dec!(6)));

        ledger.apply_fill(&fill("x", &id, OrderSide::Buy, OrderPurpose::TimeStop, 2, dec!(1))).unwrap();
        assert_eq!(ledger.realized_pnl(), dec!(600));
    }

    #[test]
    fn overclose_halts_instrument() {
        let (mut ledger, id) = ledger_with_long(2);
        ledger.apply_fill(&fill("f1", &id, OrderSide::Buy, OrderPurpose::Entry, 2, dec!(2))).unwrap();
        let err = ledger
            .apply_fill(&fill("x1", &id, OrderSide::Sell, OrderPurpose::StopLoss, 3, dec!(1)))
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvariantViolation { .. }));
        assert!(ledger.is_halted(&contract()));
        assert!(matches!(
            ledger.open_pending(SignalId::new("n"), contract(), OrderSide::Buy, 1, dec!(0.5), None, as_of()),
            Err(LedgerError::InstrumentHalted { .. })
        ));
        assert_eq!(ledger.position(&id).unwrap().quantity(), 2);

        assert!(ledger.clear_halt(&contract()));
        assert!(ledger.ensure_tradable(&contract()).is_ok());
    }

    #[test]
    fn wrong_side_entry_halts() {
        let (mut ledger, id) = ledger_with_long(2);
        let err = ledger
            .apply_fill(&fill("f1", &id, OrderSide::Sell, OrderPurpose::Entry, 1, dec!(2)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation { .. }));
        assert!(ledger.is_halted(&contract()));
    }

    #[test]
    fn late_entry_fill_revives_abandoned_position() {
        let (mut ledger, id) = ledger_with_long(2);
        ledger.abandon_pending(&id, as_of()).unwrap();
        assert_eq!(ledger.position(&id).unwrap().status(), PositionStatus::Closed);

        ledger.apply_fill(&fill("late", &id, OrderSide::Buy, OrderPurpose::Entry, 1, dec!(2))).unwrap();
        assert_eq!(ledger.position(&id).unwrap().status(), PositionStatus::Open);
        assert_eq!(ledger.net_quantity(&contract()), 1);
    }

    #[test]
    fn exits_trigger_once_until_cleared() {
        let (mut ledger, id) = ledger_with_long(2);
        ledger.apply_fill(&fill("f1", &id, OrderSide::Buy, OrderPurpose::Entry, 2, dec!(2))).unwrap();

        assert!(ledger.check_exits(&contract(), dec!(1.5), as_of(), None).is_empty());
        let triggers = ledger.check_exits(&contract(), dec!(0.9), as_of(), None);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].reason, ExitReason::StopLoss);
        assert_eq!(triggers[0].side, OrderSide::Sell);

        assert_eq!(ledger.begin_exit(&id).unwrap(), 2);
        assert!(ledger.exit_pending_for(&contract()));
        assert!(ledger.check_exits(&contract(), dec!(0.9), as_of(), None).is_empty());
        ledger.cancel_exit(&id);
        assert_eq!(ledger.check_exits(&contract(), dec!(4.5), as_of(), None)[0].reason, ExitReason::TakeProfit);
    }

    #[test]
    fn time_stop_fires_near_expiry() {
        let (mut ledger, id) = ledger_with_long(1);
        ledger.apply_fill(&fill("f1", &id, OrderSide::Buy, OrderPurpose::Entry, 1, dec!(2))).unwrap();
        let late = as_of().plus(Duration::days(24));
        let triggers = ledger.check_exits(&contract(), dec!(2), late, Some(7.0));
        assert_eq!(triggers[0].reason, ExitReason::TimeStop);
        assert!(ledger.check_exits(&contract(), dec!(2), as_of(), Some(7.0)).is_empty());
    }

    proptest! {
        #[test]
        fn replaying_fills_is_idempotent(qtys in prop::collection::vec(1u32..5, 1..8)) {
            let total: u32 = qtys.iter().sum();
            let (mut once, id_once) = ledger_with_long(total);
            let (mut twice, id_twice) = ledger_with_long(total);
            for (i, q) in qtys.iter().enumerate() {
                let name = format!("f{i}");
                once.apply_fill(&fill(&name, &id_once, OrderSide::Buy, OrderPurpose::Entry, *q, dec!(2))).unwrap();
                twice.apply_fill(&fill(&name, &id_twice, OrderSide::Buy, OrderPurpose::Entry, *q, dec!(2))).unwrap();
                let again = twice.apply_fill(&fill(&name, &id_twice, OrderSide::Buy, OrderPurpose::Entry, *q, dec!(2))).unwrap();
                prop_assert_eq!(again, LedgerOutcome::Duplicate);
            }
            prop_assert_eq!(once.net_quantity(&contract()), twice.net_quantity(&contract()));
            prop_assert_eq!(
                once.position(&id_once).unwrap().quantity(),
                twice.position(&id_twice).unwrap().quantity()
            );
        }
    }
}
