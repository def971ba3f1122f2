//! Option quote input.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{OptionContract, OptionKind, Timestamp, UnderlyingId};

/// A top-of-book quote for one option contract. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Underlying identifier.
    pub underlying: UnderlyingId,
    /// Strike price.
    pub strike: Decimal,
    /// Expiry instant.
    pub expiry: Timestamp,
    /// Call or put.
    pub kind: OptionKind,
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// Time of the last trade (or quote update).
    pub last_trade: Timestamp,
    /// Session volume, if the vendor reports it.
    #[serde(default)]
    pub volume: Option<u64>,
    /// Open interest, if the vendor reports it.
    #[serde(default)]
    pub open_interest: Option<u64>,
}

impl OptionQuote {
    /// Contract key for this quote.
    #[must_use]
    pub fn contract(&self) -> OptionContract {
        OptionContract::new(self.underlying.clone(), self.strike, self.expiry, self.kind)
    }

    /// Mid price.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Whether both sides are positive and bid does not exceed ask.
    #[must_use]
    pub fn is_two_sided(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.bid <= self.ask
    }

    /// Spread as a fraction of mid, or `None` if the mid is not positive.
    #[must_use]
    pub fn relative_spread(&self) -> Option<f64> {
        let mid = self.mid();
        if mid <= Decimal::ZERO {
            return None;
        }
        ((self.ask - self.bid) / mid).to_f64()
    }
}
