//! Crate-level error with a recovery-oriented code taxonomy.
//!
//! | Code | Class | Recovery scope |
//! |------|-------|----------------|
//! | `INVALID_DATA` | Bad or missing market data | Quote / underlying for this tick |
//! | `NUMERICAL_FAILURE` | IV inversion failed | Single surface point |
//! | `CONSTRAINT_VIOLATION` | Risk limit hit | Single signal |
//! | `TRANSIENT_EXECUTION` | Broker timeout or outage | Single order, retried |
//! | `INVARIANT_VIOLATION` | Ledger inconsistency | Instrument, until cleared |
//! | `INVALID_STATE` | Illegal lifecycle transition | Single order or signal |
//! | `CONFIGURATION` | Bad configuration | Process startup |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{BrokerError, QuoteSourceError};
use crate::config::ConfigError;
use crate::domain::ledger::LedgerError;
use crate::domain::order::OrderError;
use crate::domain::signal::SignalError;
use crate::domain::surface::{IvError, SurfaceError};

/// Error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad or missing market data.
    InvalidData,
    /// Numerical inversion failed.
    NumericalFailure,
    /// A risk constraint refused the trade.
    ConstraintViolation,
    /// Broker call failed or timed out.
    TransientExecution,
    /// Ledger consistency broken.
    InvariantViolation,
    /// Illegal lifecycle transition.
    InvalidState,
    /// Invalid configuration.
    Configuration,
}

/// Smallest unit an error is contained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryScope {
    /// Skip one quote or one underlying for the tick.
    Underlying,
    /// Drop one surface point.
    Point,
    /// Reject one signal.
    Signal,
    /// Retry, then reject one order.
    Order,
    /// Halt one instrument until manually cleared.
    Instrument,
    /// Refuse to start.
    Process,
}

impl ErrorCode {
    /// Error reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidData => "INVALID_DATA",
            Self::NumericalFailure => "NUMERICAL_FAILURE",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::TransientExecution => "TRANSIENT_EXECUTION",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::InvalidState => "INVALID_STATE",
            Self::Configuration => "CONFIGURATION",
        }
    }

    /// Where recovery happens.
    #[must_use]
    pub const fn recovery_scope(&self) -> RecoveryScope {
        match self {
            Self::InvalidData => RecoveryScope::Underlying,
            Self::NumericalFailure => RecoveryScope::Point,
            Self::ConstraintViolation => RecoveryScope::Signal,
            Self::TransientExecution | Self::InvalidState => RecoveryScope::Order,
            Self::InvariantViolation => RecoveryScope::Instrument,
            Self::Configuration => RecoveryScope::Process,
        }
    }

    /// Whether the operation may succeed if retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientExecution)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Any error surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Surface construction failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// IV inversion failed.
    #[error(transparent)]
    Iv(#[from] IvError),
    /// Signal lifecycle error.
    #[error(transparent)]
    Signal(#[from] SignalError),
    /// Order lifecycle error.
    #[error(transparent)]
    Order(#[from] OrderError),
    /// Ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Broker error.
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// Market data error.
    #[error(transparent)]
    QuoteSource(#[from] QuoteSourceError),
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Classify the error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Surface(_) | Self::QuoteSource(_) => ErrorCode::InvalidData,
            Self::Iv(_) => ErrorCode::NumericalFailure,
            Self::Signal(SignalError::NoInstrument { .. }) => ErrorCode::InvalidData,
            Self::Signal(_) | Self::Order(_) => ErrorCode::InvalidState,
            Self::Ledger(LedgerError::InvariantViolation { .. } | LedgerError::InstrumentHalted { .. }) => {
                ErrorCode::InvariantViolation
            }
            Self::Ledger(_) => ErrorCode::InvalidState,
            Self::Broker(BrokerError::Rejected { .. }) => ErrorCode::ConstraintViolation,
            Self::Broker(_) => ErrorCode::TransientExecution,
            Self::Config(_) => ErrorCode::Configuration,
        }
    }
}
