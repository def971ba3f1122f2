//! Ledger errors.

use thiserror::Error;

use crate::domain::shared::{OptionContract, PositionId};

/// Errors from position bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No position with this id.
    #[error("Position not found: {position_id}")]
    UnknownPosition {
        /// Position id.
        position_id: PositionId,
    },

    /// A mutation would break ledger consistency. The instrument is halted.
    #[error("Ledger invariant violated on {contract}: {detail}")]
    InvariantViolation {
        /// Affected instrument.
        contract: OptionContract,
        /// What was inconsistent.
        detail: String,
    },

    /// Instrument halted by an earlier invariant violation.
    #[error("Instrument {contract} is halted: {reason}")]
    InstrumentHalted {
        /// Halted instrument.
        contract: OptionContract,
        /// Original violation.
        reason: String,
    },

    /// Operation not allowed in the position's current state.
    #[error("Position {position_id} cannot {operation} while {status}")]
    InvalidState {
        /// Position id.
        position_id: PositionId,
        /// Attempted operation.
        operation: &'static str,
        /// Current status.
        status: String,
    },
}
