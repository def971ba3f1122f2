//! Order aggregate.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::OrderError;
use super::fill::FillNotification;
use super::side::{OrderPurpose, OrderSide};
use super::status::{OrderStateMachine, OrderStatus};
use crate::domain::shared::{
    BrokerOrderId, FillId, OptionContract, OrderId, SignalId, Timestamp,
};

/// Result of offering a fill to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Fill accepted in the normal lifecycle.
    Applied {
        /// Status after the fill.
        status: OrderStatus,
    },
    /// Fill id already applied; nothing changed.
    Duplicate,
    /// Fill arrived after the order was cancelled or rejected. The quantity is
    /// recorded but the status stays terminal.
    Late {
        /// Terminal status the order keeps.
        status: OrderStatus,
    },
}

/// A single-leg limit order against one option contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    broker_order_id: Option<BrokerOrderId>,
    signal_id: Option<SignalId>,
    contract: OptionContract,
    side: OrderSide,
    purpose: OrderPurpose,
    quantity: u32,
    limit_price: Decimal,
    status: OrderStatus,
    cum_qty: u32,
    avg_fill_price: Decimal,
    fill_ids: HashSet<FillId>,
    attempts: u32,
    cancel_requested: bool,
    reject_reason: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Order {
    /// Create a new order in `Created` status.
    ///
    /// # Errors
    ///
    /// Returns an error if quantity is zero or the limit price is not positive.
    pub fn new(
        contract: OptionContract,
        side: OrderSide,
        purpose: OrderPurpose,
        quantity: u32,
        limit_price: Decimal,
        signal_id: Option<SignalId>,
        now: Timestamp,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidParameters {
                field: "quantity".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if limit_price <= Decimal::ZERO {
            return Err(OrderError::InvalidParameters {
                field: "limit_price".to_string(),
                message: format!("must be positive, got {limit_price}"),
            });
        }
        Ok(Self {
            id: OrderId::generate(),
            broker_order_id: None,
            signal_id,
            contract,
            side,
            purpose,
            quantity,
            limit_price,
            status: OrderStatus::Created,
            cum_qty: 0,
            avg_fill_price: Decimal::ZERO,
            fill_ids: HashSet::new(),
            attempts: 0,
            cancel_requested: false,
            reject_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Engine order id.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Broker order id once acknowledged.
    #[must_use]
    pub const fn broker_order_id(&self) -> Option<&BrokerOrderId> {
        self.broker_order_id.as_ref()
    }

    /// Originating signal, if any.
    #[must_use]
    pub const fn signal_id(&self) -> Option<&SignalId> {
        self.signal_id.as_ref()
    }

    /// Contract traded.
    #[must_use]
    pub const fn contract(&self) -> &OptionContract {
        &self.contract
    }

    /// Side.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Purpose.
    #[must_use]
    pub const fn purpose(&self) -> OrderPurpose {
        self.purpose
    }

    /// Target quantity.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Limit price.
    #[must_use]
    pub const fn limit_price(&self) -> Decimal {
        self.limit_price
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Filled quantity so far.
    #[must_use]
    pub const fn cum_qty(&self) -> u32 {
        self.cum_qty
    }

    /// Unfilled quantity.
    #[must_use]
    pub const fn leaves_qty(&self) -> u32 {
        self.quantity.saturating_sub(self.cum_qty)
    }

    /// Volume-weighted average fill price.
    #[must_use]
    pub const fn avg_fill_price(&self) -> Decimal {
        self.avg_fill_price
    }

    /// Submission attempts made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a cancel has been requested.
    #[must_use]
    pub const fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Rejection reason, if rejected.
    #[must_use]
    pub fn reject_reason(&self) -> Option<&str> {
        self.reject_reason.as_deref()
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Last modification time.
    #[must_use]
    pub const fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn transition(&mut self, to: OrderStatus, now: Timestamp) -> Result<(), OrderError> {
        OrderStateMachine::validate_transition(self.status, to)?;
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Count a submission attempt.
    pub const fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Broker acknowledged the order. A no-op if fills already advanced it.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is already terminal.
    pub fn mark_submitted(
        &mut self,
        broker_order_id: BrokerOrderId,
        now: Timestamp,
    ) -> Result<(), OrderError> {
        self.broker_order_id = Some(broker_order_id);
        match self.status {
            OrderStatus::Created => self.transition(OrderStatus::Submitted, now),
            OrderStatus::Submitted | OrderStatus::PartiallyFilled | OrderStatus::Filled => Ok(()),
            other => Err(OrderError::InvalidStateTransition {
                from: other,
                to: OrderStatus::Submitted,
                reason: OrderStateMachine::transition_error_reason(other, OrderStatus::Submitted),
            }),
        }
    }

    /// Mark rejected with a reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the order has already filled or been cancelled.
    pub fn reject(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), OrderError> {
        self.transition(OrderStatus::Rejected, now)?;
        self.reject_reason = Some(reason.into());
        Ok(())
    }

    /// Flag that a cancel has been sent.
    pub const fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Broker confirmed the cancel.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is already terminal.
    pub fn mark_cancelled(&mut self, now: Timestamp) -> Result<(), OrderError> {
        self.transition(OrderStatus::Cancelled, now)
    }

    /// Offer a fill. Duplicates are ignored; fills after cancel/reject are
    /// recorded as late without changing status.
    ///
    /// # Errors
    ///
    /// Returns an error if the fill would exceed the target quantity or the
    /// order is already filled.
    pub fn apply_fill(&mut self, fill: &FillNotification) -> Result<FillOutcome, OrderError> {
        if self.fill_ids.contains(&fill.fill_id) {
            return Ok(FillOutcome::Duplicate);
        }
        if fill.quantity == 0 {
            return Err(OrderError::InvalidParameters {
                field: "fill.quantity".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if fill.quantity > self.leaves_qty() {
            return Err(OrderError::FillExceedsRemaining {
                fill_qty: fill.quantity,
                remaining_qty: self.leaves_qty(),
            });
        }

        let late = matches!(self.status, OrderStatus::Cancelled | OrderStatus::Rejected);
        if !late {
            if self.status == OrderStatus::Created {
                self.transition(OrderStatus::Submitted, fill.timestamp)?;
            }
            let next = if fill.quantity == self.leaves_qty() {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            self.transition(next, fill.timestamp)?;
        }

        let new_cum = self.cum_qty + fill.quantity;
        let old_value = self.avg_fill_price * Decimal::from(self.cum_qty);
        let fill_value = fill.price * Decimal::from(fill.quantity);
        self.avg_fill_price = (old_value + fill_value) / Decimal::from(new_cum);
        self.cum_qty = new_cum;
        self.fill_ids.insert(fill.fill_id.clone());
        self.updated_at = fill.timestamp;

        Ok(if late {
            FillOutcome::Late {
                status: self.status,
            }
        } else {
            FillOutcome::Applied {
                status: self.status,
            }
        })
    }
}
