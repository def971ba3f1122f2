//! Order lifecycle: status machine, aggregate and fills.

mod errors;
mod fill;
mod order;
mod side;
mod status;

pub use errors::OrderError;
pub use fill::FillNotification;
pub use order::{FillOutcome, Order};
pub use side::{OrderPurpose, OrderSide};
pub use status::{OrderStateMachine, OrderStatus};
