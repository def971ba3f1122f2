//! Trade signal and instrument selection.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::SignalError;
use super::state::{SignalState, SignalStateMachine};
use crate::domain::anomaly::{AnomalySignal, Direction};
use crate::domain::order::OrderSide;
use crate::domain::shared::{OptionContract, OptionKind, SignalId, Timestamp, UnderlyingId};
use crate::domain::surface::{VolatilityPoint, VolatilitySurface};

/// One leg of the selected structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalLeg {
    /// Contract to trade.
    pub contract: OptionContract,
    /// Buy or sell.
    pub side: OrderSide,
    /// Quote bid at selection.
    pub bid: Decimal,
    /// Quote ask at selection.
    pub ask: Decimal,
}

impl SignalLeg {
    fn from_point(point: &VolatilityPoint, side: OrderSide) -> Self {
        Self {
            contract: point.contract.clone(),
            side,
            bid: point.bid,
            ask: point.ask,
        }
    }

    /// Marketable limit: ask when buying, bid when selling.
    #[must_use]
    pub const fn limit_price(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }
}

/// Inclusive premium band for one unit of the structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    /// Sum of leg bids.
    pub low: Decimal,
    /// Sum of leg asks.
    pub high: Decimal,
}

/// A trade proposal derived from one or more anomalies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Signal id.
    pub id: SignalId,
    /// Underlying.
    pub underlying: UnderlyingId,
    /// Direction shared by all contributing anomalies.
    pub direction: Direction,
    /// Selected legs (one for directional, two for straddles).
    pub legs: Vec<SignalLeg>,
    /// Aggregated confidence in `[0, 1]`.
    pub confidence: f64,
    /// Entry premium band per unit.
    pub entry_band: PriceBand,
    /// Contributing anomalies.
    pub anomalies: Vec<AnomalySignal>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Deadline for a risk decision.
    pub expires_at: Timestamp,
    state: SignalState,
}

impl TradeSignal {
    /// Create a signal in `Evaluating` state.
    #[must_use]
    pub fn new(
        underlying: UnderlyingId,
        direction: Direction,
        legs: Vec<SignalLeg>,
        confidence: f64,
        anomalies: Vec<AnomalySignal>,
        created_at: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        let entry_band = legs.iter().fold(
            PriceBand {
                low: Decimal::ZERO,
                high: Decimal::ZERO,
            },
            |band, leg| PriceBand {
                low: band.low + leg.bid,
                high: band.high + leg.ask,
            },
        );
        Self {
            id: SignalId::generate(),
            underlying,
            direction,
            legs,
            confidence,
            entry_band,
            anomalies,
            created_at,
            expires_at,
            state: SignalState::Evaluating,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SignalState {
        self.state
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is invalid.
    pub fn transition(&mut self, to: SignalState) -> Result<(), SignalError> {
        SignalStateMachine::validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }

    /// Whether the decision deadline has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Side of the structure (all legs share it).
    #[must_use]
    pub fn side(&self) -> OrderSide {
        self.legs.first().map_or(OrderSide::Buy, |l| l.side)
    }

    /// Premium per unit at entry: band high when buying, band low when selling.
    #[must_use]
    pub fn entry_price(&self) -> Decimal {
        match self.side() {
            OrderSide::Buy => self.entry_band.high,
            OrderSide::Sell => self.entry_band.low,
        }
    }

    /// Contracts referenced by the legs.
    pub fn contracts(&self) -> impl Iterator<Item = &OptionContract> {
        self.legs.iter().map(|l| &l.contract)
    }
}

/// Pick legs for `direction`: strike nearest the forward in the expiry nearest
/// `target_dte`. Bullish buys a call, bearish buys a put, long volatility buys
/// a straddle and short volatility sells one.
///
/// # Errors
///
/// Returns `NoInstrument` if the surface lacks a suitable contract.
pub fn select_legs(
    surface: &VolatilitySurface,
    direction: Direction,
    target_dte: f64,
) -> Result<Vec<SignalLeg>, SignalError> {
    let missing = |reason: &str| SignalError::NoInstrument {
        underlying: surface.underlying().clone(),
        direction,
        reason: reason.to_string(),
    };

    let expiry = surface
        .nearest_expiry(target_dte)
        .ok_or_else(|| missing("no expiry"))?;

    let single = |kind: OptionKind| -> Result<Vec<SignalLeg>, SignalError> {
        let point = surface
            .nearest_forward_point(expiry, kind)
            .ok_or_else(|| missing("no quoted contract of the required type"))?;
        Ok(vec![SignalLeg::from_point(point, OrderSide::Buy)])
    };

    let straddle = |side: OrderSide| -> Result<Vec<SignalLeg>, SignalError> {
        let strike = surface
            .straddle_strike(expiry)
            .ok_or_else(|| missing("no strike quoted on both sides"))?;
        let underlying = surface.underlying().clone();
        [OptionKind::Call, OptionKind::Put]
            .into_iter()
            .map(|kind| {
                let contract = OptionContract::new(underlying.clone(), strike, expiry, kind);
                surface
                    .point(&contract)
                    .map(|p| SignalLeg::from_point(p, side))
                    .ok_or_else(|| missing("straddle leg missing"))
            })
            .collect()
    };

    match direction {
        Direction::Bullish => single(OptionKind::Call),
        Direction::Bearish => single(OptionKind::Put),
        Direction::LongVolatility => straddle(OrderSide::Buy),
        Direction::ShortVolatility => straddle(OrderSide::Sell),
    }
}
