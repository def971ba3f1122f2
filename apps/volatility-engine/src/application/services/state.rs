//! Shared trading state: ledger, capital and working orders behind one lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::domain::ledger::PositionLedger;
use crate::domain::order::Order;
use crate::domain::risk::{CapitalAccount, PortfolioSnapshot};
use crate::domain::shared::{OrderId, PositionId, SignalId};

/// An order and the position its fills book against.
#[derive(Debug, Clone)]
pub struct TrackedOrder {
    /// The order.
    pub order: Order,
    /// Position fed by this order.
    pub position_id: PositionId,
}

/// Everything risk and execution mutate. Risk evaluation and capital
/// reservation happen under a single acquisition of the lock.
#[derive(Debug)]
pub struct TradingState {
    /// Positions.
    pub ledger: PositionLedger,
    /// Equity and reservations.
    pub capital: CapitalAccount,
    /// Orders by id: working ones plus the most recently finished.
    pub orders: HashMap<OrderId, TrackedOrder>,
    /// Entry orders per approved signal.
    pub signal_entries: HashMap<SignalId, Vec<OrderId>>,
    /// Finished orders, oldest first.
    finished: VecDeque<OrderId>,
}

/// Handle shared by the risk gate, the coordinator and the reconciler.
pub type SharedState = Arc<Mutex<TradingState>>;

impl TradingState {
    /// Fresh state with starting capital.
    #[must_use]
    pub fn new(initial_equity: Decimal, multiplier: Decimal) -> Self {
        Self {
            ledger: PositionLedger::new(multiplier),
            capital: CapitalAccount::new(initial_equity),
            orders: HashMap::new(),
            signal_entries: HashMap::new(),
            finished: VecDeque::new(),
        }
    }

    /// Wrap in the shared handle.
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Capital and exposure view. Reserved signals count at their
    /// reservation; everything else at open cost basis.
    #[must_use]
    pub fn portfolio_snapshot(&self) -> PortfolioSnapshot {
        let committed = self
            .ledger
            .committed_by_underlying(|signal| self.capital.is_reserved(signal));
        self.capital.snapshot(committed)
    }

    /// Release the signal's reservation once every entry order is terminal.
    pub fn settle_entries(&mut self, signal_id: &SignalId) -> bool {
        let Some(ids) = self.signal_entries.get(signal_id) else {
            return false;
        };
        let done = ids.iter().all(|id| {
            self.orders
                .get(id)
                .is_none_or(|t| t.order.status().is_terminal())
        });
        if done {
            self.signal_entries.remove(signal_id);
            if let Some(amount) = self.capital.release(signal_id) {
                tracing::debug!(signal_id = %signal_id, amount = %amount, "Reservation released");
            }
        }
        done
    }

    /// Record a terminal order and drop the oldest finished orders beyond
    /// `retention`. Late fills for a dropped order are reported unknown.
    pub fn retire_order(&mut self, order_id: &OrderId, retention: usize) {
        if self.finished.contains(order_id) {
            return;
        }
        self.finished.push_back(order_id.clone());
        while self.finished.len() > retention {
            if let Some(oldest) = self.finished.pop_front() {
                self.orders.remove(&oldest);
                tracing::debug!(order_id = %oldest, "Finished order dropped");
            }
        }
    }

    /// Number of finished orders still held.
    #[must_use]
    pub fn finished_orders(&self) -> usize {
        self.finished.len()
    }
}
