//! Signal errors.

use thiserror::Error;

use super::SignalState;
use crate::domain::anomaly::Direction;
use crate::domain::shared::{SignalId, UnderlyingId};

/// Errors from signal generation and lifecycle handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Invalid state transition attempted.
    #[error("Invalid signal state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current state.
        from: SignalState,
        /// Attempted state.
        to: SignalState,
    },

    /// No outstanding signal with this id.
    #[error("Unknown or already decided signal: {signal_id}")]
    UnknownSignal {
        /// Signal id.
        signal_id: SignalId,
    },

    /// The surface offers no contract for the direction.
    #[error("No instrument for {direction} on {underlying}: {reason}")]
    NoInstrument {
        /// Underlying.
        underlying: UnderlyingId,
        /// Requested direction.
        direction: Direction,
        /// What was missing.
        reason: String,
    },
}
