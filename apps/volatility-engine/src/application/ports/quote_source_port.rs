//! Quote Source Port (Driven Port)
//!
//! Interface for fetching an option chain snapshot per underlying.

use async_trait::async_trait;

use crate::domain::shared::{Timestamp, UnderlyingId};
use crate::domain::surface::OptionQuote;

/// Spot and option quotes for one underlying at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Underlying.
    pub underlying: UnderlyingId,
    /// Underlying spot.
    pub spot: f64,
    /// Option quotes.
    pub quotes: Vec<OptionQuote>,
    /// Snapshot time.
    pub as_of: Timestamp,
}

/// Quote source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteSourceError {
    /// Nothing available for the underlying this tick.
    #[error("No market data for {underlying}")]
    NoData {
        /// Underlying.
        underlying: UnderlyingId,
    },

    /// Source unreachable.
    #[error("Quote source unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Fetch did not complete in time.
    #[error("Quote fetch for {underlying} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Underlying.
        underlying: UnderlyingId,
        /// Time waited.
        elapsed_ms: u64,
    },
}

/// Port for market data.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Latest snapshot for `underlying`.
    async fn fetch(&self, underlying: &UnderlyingId) -> Result<MarketSnapshot, QuoteSourceError>;
}
