// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Volatility Engine - Rust Core Library
//!
//! Detects implied-volatility anomalies across option chains and trades
//! them under explicit risk limits.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `surface`: Quote inversion, Greeks, interpolation, shape metrics
//!   - `anomaly`: Rolling baselines and pattern detection
//!   - `signal`: Signal lifecycle and anomaly correlation
//!   - `risk`: Capital, exposure and drawdown checks; sizing; exits
//!   - `order`: Order aggregate, status lifecycle, fills
//!   - `ledger`: Positions, P&L and consistency checks
//!
//! - **Application**: Orchestration
//!   - `ports`: `QuoteSource`, `BrokerPort`, `AuditSink`
//!   - `services`: `TradingPipeline`, `RiskGate`, `ExecutionCoordinator`
//!   - `retry`: Backoff policy for broker calls
//!
//! - **Infrastructure**: Adapters
//!   - `broker`: Simulated broker
//!   - `market_data`: Static quote source
//!   - `audit`: Tracing and in-memory audit sinks

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Typed YAML configuration.
pub mod config;

/// Crate-level error and recovery taxonomy.
pub mod error;

/// Logging and metrics.
pub mod observability;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::anomaly::{AnomalyDetector, AnomalyPattern, AnomalySignal, Direction};
pub use domain::ledger::{Position, PositionLedger, PositionStatus};
pub use domain::order::{FillNotification, Order, OrderPurpose, OrderSide, OrderStatus};
pub use domain::risk::{RiskDecision, RiskManager};
pub use domain::shared::{OptionContract, OptionKind, Timestamp, UnderlyingId};
pub use domain::signal::{SignalGenerator, SignalState, TradeSignal};
pub use domain::surface::{OptionQuote, VolatilitySurface, VolatilitySurfaceEngine};

// Application re-exports
pub use application::ports::{
    AuditSink, AuditTrail, BrokerError, BrokerPort, MarketSnapshot, QuoteSource,
};
pub use application::services::{ExecutionCoordinator, RiskGate, TickReport, TradingPipeline};

// Infrastructure re-exports
pub use infrastructure::{InMemoryAuditSink, SimulatedBroker, StaticQuoteSource, TracingAuditSink};

pub use config::{Config, load_config};
pub use error::{EngineError, ErrorCode};
