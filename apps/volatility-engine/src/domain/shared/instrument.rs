//! Option instrument value objects.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Timestamp, UnderlyingId};

/// Option type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// A single listed option: the key for orders, positions and marks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying identifier.
    pub underlying: UnderlyingId,
    /// Strike price.
    pub strike: Decimal,
    /// Expiry instant.
    pub expiry: Timestamp,
    /// Call or put.
    pub kind: OptionKind,
}

impl OptionContract {
    /// Create a new contract key.
    #[must_use]
    pub const fn new(
        underlying: UnderlyingId,
        strike: Decimal,
        expiry: Timestamp,
        kind: OptionKind,
    ) -> Self {
        Self {
            underlying,
            strike,
            expiry,
            kind,
        }
    }

    /// Days remaining until expiry as of `now` (negative once expired).
    #[must_use]
    pub fn days_to_expiry(&self, now: Timestamp) -> f64 {
        now.days_until(self.expiry)
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}{}",
            self.underlying,
            self.expiry.as_datetime().format("%Y-%m-%d"),
            self.strike,
            self.kind
        )
    }
}
