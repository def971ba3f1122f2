//! Order errors.

use thiserror::Error;

use super::OrderStatus;
use crate::domain::shared::OrderId;

/// Errors that can occur in order handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Invalid state transition attempted.
    #[error("Invalid order state transition: {from} -> {to}: {reason}")]
    InvalidStateTransition {
        /// Current order status.
        from: OrderStatus,
        /// Attempted status.
        to: OrderStatus,
        /// Reason for failure.
        reason: String,
    },

    /// Fill quantity exceeds remaining quantity.
    #[error("Fill quantity {fill_qty} exceeds remaining quantity {remaining_qty}")]
    FillExceedsRemaining {
        /// Fill quantity attempted.
        fill_qty: u32,
        /// Remaining quantity.
        remaining_qty: u32,
    },

    /// Invalid order parameters.
    #[error("Invalid order parameter '{field}': {message}")]
    InvalidParameters {
        /// Field with invalid value.
        field: String,
        /// Error message.
        message: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    NotFound {
        /// Order ID.
        order_id: OrderId,
    },
}
