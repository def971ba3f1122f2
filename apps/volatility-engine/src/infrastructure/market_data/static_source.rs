//! Quote source backed by snapshots pushed in by the caller.
//!
//! Each snapshot is served until replaced or cleared. An underlying with no
//! snapshot yields `NoData`, so the pipeline skips it.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{MarketSnapshot, QuoteSource, QuoteSourceError};
use crate::domain::shared::UnderlyingId;

/// In-memory `QuoteSource`.
#[derive(Debug, Default)]
pub struct StaticQuoteSource {
    snapshots: RwLock<HashMap<UnderlyingId, MarketSnapshot>>,
}

impl StaticQuoteSource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the snapshot for its underlying, replacing any previous one.
    pub fn publish(&self, snapshot: MarketSnapshot) {
        self.snapshots
            .write()
            .insert(snapshot.underlying.clone(), snapshot);
    }

    /// Withdraw data for an underlying.
    pub fn clear(&self, underlying: &UnderlyingId) {
        self.snapshots.write().remove(underlying);
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    async fn fetch(&self, underlying: &UnderlyingId) -> Result<MarketSnapshot, QuoteSourceError> {
        self.snapshots
            .read()
            .get(underlying)
            .cloned()
            .ok_or_else(|| QuoteSourceError::NoData {
                underlying: underlying.clone(),
            })
    }
}
