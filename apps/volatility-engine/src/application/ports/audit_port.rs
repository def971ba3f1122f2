//! Audit Port (Driven Port)
//!
//! Sequence-numbered structured records of every signal, risk decision, order
//! transition and ledger mutation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::anomaly::Direction;
use crate::domain::ledger::{Position, PositionStatus};
use crate::domain::order::{Order, OrderPurpose, OrderSide, OrderStatus};
use crate::domain::risk::RiskDecision;
use crate::domain::shared::{
    OptionContract, OrderId, PositionId, SignalId, Timestamp, UnderlyingId,
};
use crate::domain::signal::{SignalState, TradeSignal};

/// Audited payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditRecord {
    /// Trade signal changed state.
    Signal {
        /// Signal id.
        signal_id: SignalId,
        /// Underlying.
        underlying: UnderlyingId,
        /// New state.
        state: SignalState,
        /// Direction.
        direction: Direction,
        /// Confidence.
        confidence: f64,
    },
    /// Risk manager decided.
    RiskDecision {
        /// Decision.
        decision: RiskDecision,
    },
    /// Order changed state.
    Order {
        /// Order id.
        order_id: OrderId,
        /// Owning signal.
        signal_id: Option<SignalId>,
        /// Contract.
        contract: OptionContract,
        /// Side.
        side: OrderSide,
        /// Entry or exit.
        purpose: OrderPurpose,
        /// New status.
        status: OrderStatus,
        /// Filled quantity.
        cum_qty: u32,
        /// Submission attempts.
        attempts: u32,
        /// Rejection reason.
        reason: Option<String>,
    },
    /// Ledger position changed.
    Ledger {
        /// Position id.
        position_id: PositionId,
        /// Contract.
        contract: OptionContract,
        /// Open quantity.
        quantity: u32,
        /// Average entry premium.
        avg_entry_price: Decimal,
        /// Realized P&L so far.
        realized_pnl: Decimal,
        /// Status.
        status: PositionStatus,
    },
    /// Condition an operator must act on.
    Alert {
        /// What happened.
        message: String,
        /// Related order.
        order_id: Option<OrderId>,
        /// Related instrument.
        contract: Option<OptionContract>,
    },
}

impl AuditRecord {
    /// Record for a signal's current state.
    #[must_use]
    pub fn signal(signal: &TradeSignal) -> Self {
        Self::Signal {
            signal_id: signal.id.clone(),
            underlying: signal.underlying.clone(),
            state: signal.state(),
            direction: signal.direction,
            confidence: signal.confidence,
        }
    }

    /// Record for an order's current state.
    #[must_use]
    pub fn order(order: &Order) -> Self {
        Self::Order {
            order_id: order.id().clone(),
            signal_id: order.signal_id().cloned(),
            contract: order.contract().clone(),
            side: order.side(),
            purpose: order.purpose(),
            status: order.status(),
            cum_qty: order.cum_qty(),
            attempts: order.attempts(),
            reason: order.reject_reason().map(str::to_string),
        }
    }

    /// Record for a position's current state.
    #[must_use]
    pub fn ledger(position: &Position) -> Self {
        Self::Ledger {
            position_id: position.id().clone(),
            contract: position.contract().clone(),
            quantity: position.quantity(),
            avg_entry_price: position.avg_entry_price(),
            realized_pnl: position.realized_pnl(),
            status: position.status(),
        }
    }

    /// Short event name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Signal { .. } => "signal",
            Self::RiskDecision { .. } => "risk_decision",
            Self::Order { .. } => "order",
            Self::Ledger { .. } => "ledger",
            Self::Alert { .. } => "alert",
        }
    }
}

/// One audit event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// Emission time.
    pub timestamp: Timestamp,
    /// Payload.
    #[serde(flatten)]
    pub record: AuditRecord,
}

/// Port for the audit trail.
pub trait AuditSink: Send + Sync {
    /// Persist or forward one event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that discards events.
#[derive(Debug, Clone, Default)]
pub struct NoOpAuditSink;

impl AuditSink for NoOpAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Assigns sequence numbers and forwards to a sink.
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AuditTrail {
    /// Wrap a sink.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            sequence: AtomicU64::new(0),
        }
    }

    /// Emit a record; returns its sequence number.
    pub fn emit(&self, record: AuditRecord) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = AuditEvent {
            sequence,
            timestamp: Timestamp::now(),
            record,
        };
        self.sink.record(&event);
        sequence
    }

    /// Last sequence number issued.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
