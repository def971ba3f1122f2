//! Signal generation: anomaly correlation, confidence and instrument selection.

mod errors;
mod generator;
mod rules;
mod state;
mod trade_signal;

pub use errors::SignalError;
pub use generator::SignalGenerator;
pub use rules::RuleTable;
pub use state::{SignalState, SignalStateMachine};
pub use trade_signal::{PriceBand, SignalLeg, TradeSignal, select_legs};
