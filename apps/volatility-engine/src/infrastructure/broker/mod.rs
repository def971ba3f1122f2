//! Broker Adapters
//!
//! Implementations of `BrokerPort`.

mod simulated;

pub use simulated::{FillMode, SimulatedBroker, SubmitBehavior};
