//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `broker/`: In-process simulated broker for paper trading and tests
//! - `market_data/`: Quote sources
//! - `audit/`: Audit sinks (structured log, in-memory)

pub mod audit;
pub mod broker;
pub mod market_data;

pub use audit::{InMemoryAuditSink, TracingAuditSink};
pub use broker::{FillMode, SimulatedBroker, SubmitBehavior};
pub use market_data::StaticQuoteSource;
