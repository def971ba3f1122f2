//! Broker fill notifications.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{FillId, OrderId, Timestamp};

/// One execution reported by the broker. `fill_id` is unique per execution
/// and is the idempotency key for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillNotification {
    /// Broker execution id.
    pub fill_id: FillId,
    /// Engine order id the fill belongs to.
    pub order_id: OrderId,
    /// Contracts filled.
    pub quantity: u32,
    /// Execution price per contract (premium).
    pub price: Decimal,
    /// Execution time.
    pub timestamp: Timestamp,
}
