//! Shared kernel: identifiers, time and instrument keys used across contexts.

mod identifiers;
mod instrument;
mod timestamp;

pub use identifiers::{BrokerOrderId, FillId, OrderId, PositionId, SignalId, UnderlyingId};
pub use instrument::{OptionContract, OptionKind};
pub use timestamp::Timestamp;
