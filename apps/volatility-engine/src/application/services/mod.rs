//! Application Services
//!
//! Services coordinate domain logic with the ports. The pipeline drives
//! ticks; the risk gate and execution coordinator share one trading state.

mod execution;
mod pipeline;
mod risk_gate;
mod state;

pub use execution::ExecutionCoordinator;
pub use pipeline::{TickReport, TradingPipeline, UnderlyingReport};
pub use risk_gate::RiskGate;
pub use state::{SharedState, TrackedOrder, TradingState};
