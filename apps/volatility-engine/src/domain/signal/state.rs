//! Signal lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::SignalError;

/// Lifecycle of a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    /// No anomaly is being tracked.
    Idle,
    /// Anomalies are accumulating in the correlation window.
    Evaluating,
    /// Handed to risk, awaiting a decision.
    Proposed,
    /// Risk approved; handed to execution.
    Approved,
    /// Risk rejected.
    Rejected,
    /// Not decided within its time-to-live.
    Expired,
    /// Lost a tie-break to a higher-confidence candidate.
    Superseded,
}

impl SignalState {
    /// Returns true if no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Expired | Self::Superseded
        )
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Evaluating => "EVALUATING",
            Self::Proposed => "PROPOSED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Superseded => "SUPERSEDED",
        };
        f.write_str(s)
    }
}

/// Validates signal state transitions.
pub struct SignalStateMachine;

impl SignalStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub const fn is_valid_transition(from: SignalState, to: SignalState) -> bool {
        matches!(
            (from, to),
            (SignalState::Idle, SignalState::Evaluating)
                | (SignalState::Evaluating, SignalState::Idle)
                | (SignalState::Evaluating, SignalState::Proposed)
                | (SignalState::Evaluating, SignalState::Superseded)
                | (SignalState::Proposed, SignalState::Approved)
                | (SignalState::Proposed, SignalState::Rejected)
                | (SignalState::Proposed, SignalState::Expired)
                | (SignalState::Proposed, SignalState::Superseded)
        )
    }

    /// Validate a state transition.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is invalid.
    pub fn validate_transition(from: SignalState, to: SignalState) -> Result<(), SignalError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(SignalError::InvalidStateTransition { from, to })
        }
    }
}
