//! Broker Port (Driven Port)
//!
//! Interface for submitting and cancelling orders. Fills arrive
//! asynchronously as [`FillNotification`](crate::domain::order::FillNotification)s
//! on the channel the adapter was built with.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::{Order, OrderSide};
use crate::domain::shared::{BrokerOrderId, OptionContract, OrderId};

/// Request to submit a limit order to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Client order ID.
    pub client_order_id: OrderId,
    /// Contract to trade.
    pub contract: OptionContract,
    /// Order side.
    pub side: OrderSide,
    /// Contracts.
    pub quantity: u32,
    /// Limit price per contract.
    pub limit_price: Decimal,
}

impl SubmitOrderRequest {
    /// Build the request for an order.
    #[must_use]
    pub fn from_order(order: &Order) -> Self {
        Self {
            client_order_id: order.id().clone(),
            contract: order.contract().clone(),
            side: order.side(),
            quantity: order.quantity(),
            limit_price: order.limit_price(),
        }
    }
}

/// Acknowledgment from broker after order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Broker-assigned order ID.
    pub broker_order_id: BrokerOrderId,
    /// Client order ID echoed back.
    pub client_order_id: OrderId,
}

/// Broker port error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Call did not complete in time.
    #[error("Broker call timed out after {elapsed_ms}ms")]
    Timeout {
        /// Time waited.
        elapsed_ms: u64,
    },

    /// Temporary failure (connection, rate limit).
    #[error("Broker temporarily unavailable: {message}")]
    Transient {
        /// Error details.
        message: String,
    },

    /// Order refused by broker; retrying will not help.
    #[error("Order rejected: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },
}

impl BrokerError {
    /// Whether the call may succeed if retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transient { .. })
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transient { .. } => "transient",
            Self::Rejected { .. } => "rejected",
            Self::OrderNotFound { .. } => "not_found",
        }
    }
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Submit an order to the broker.
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError>;

    /// Cancel an order.
    async fn cancel_order(&self, broker_order_id: &BrokerOrderId) -> Result<(), BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderPurpose;
    use crate::domain::shared::{OptionKind, Timestamp};
    use rust_decimal_macros::dec;

    #[test]
    fn request_mirrors_order() {
        let contract = OptionContract::new("SPY".into(), dec!(450), Timestamp::default(), OptionKind::Put);
        let order = Order::new(
            contract.clone(),
            OrderSide::Buy,
            OrderPurpose::Entry,
            3,
            dec!(2.15),
            None,
            Timestamp::default(),
        )
        .unwrap();
        let request = SubmitOrderRequest::from_order(&order);

        assert_eq!(&request.client_order_id, order.id());
        assert_eq!(request.contract, contract);
        assert_eq!(request.quantity, 3);
        assert_eq!(request.limit_price, dec!(2.15));
    }

    #[test]
    fn only_transient_errors_retry() {
        assert!(BrokerError::Timeout { elapsed_ms: 10 }.is_retryable());
        assert!(BrokerError::Transient { message: "503".into() }.is_retryable());
        assert!(!BrokerError::Rejected { reason: "halted".into() }.is_retryable());
    }
}
