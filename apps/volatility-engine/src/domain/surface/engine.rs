//! Surface construction from a quote batch.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

use super::iv::IvSolver;
use super::pricing::{DAYS_PER_YEAR, Greeks, forward};
use super::surface::{VolatilitySurface, WingMoneyness, point_from_quote};
use super::{ExcludedQuote, ExclusionReason, OptionQuote};
use crate::config::SurfaceConfig;
use crate::domain::shared::{Timestamp, UnderlyingId};
use crate::observability;

/// Errors that stop a surface build.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    /// The batch contained no quotes.
    #[error("empty quote batch for {underlying}")]
    EmptyBatch {
        /// Underlying requested.
        underlying: UnderlyingId,
    },
    /// Spot was non-positive or non-finite.
    #[error("invalid spot {spot} for {underlying}")]
    InvalidSpot {
        /// Underlying requested.
        underlying: UnderlyingId,
        /// Offending spot.
        spot: f64,
    },
    /// Rate or dividend yield was non-finite.
    #[error("invalid rate {rate} / dividend yield {dividend_yield}")]
    InvalidRate {
        /// Risk-free rate.
        rate: f64,
        /// Dividend yield.
        dividend_yield: f64,
    },
    /// Every quote was excluded.
    #[error("no valid points for {underlying} ({} quotes excluded)", excluded.len())]
    NoValidPoints {
        /// Underlying requested.
        underlying: UnderlyingId,
        /// All excluded quotes, with reasons.
        excluded: Vec<ExcludedQuote>,
    },
}

/// Market inputs shared by all quotes in a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketContext {
    /// Underlying spot.
    pub spot: f64,
    /// Continuous risk-free rate.
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend_yield: f64,
    /// Valuation instant.
    pub as_of: Timestamp,
}

/// Builds an implied-volatility surface per underlying per tick.
#[derive(Debug, Clone)]
pub struct VolatilitySurfaceEngine {
    config: SurfaceConfig,
    solver: IvSolver,
}

impl VolatilitySurfaceEngine {
    /// Create an engine from configuration.
    #[must_use]
    pub fn new(config: SurfaceConfig) -> Self {
        let solver = IvSolver::new(config.iv_solver.clone());
        Self { config, solver }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Wing placement from configuration.
    #[must_use]
    pub const fn wings(&self) -> WingMoneyness {
        WingMoneyness {
            put: self.config.put_wing_moneyness,
            call: self.config.call_wing_moneyness,
        }
    }

    /// Build the surface for `underlying` from `quotes`.
    ///
    /// Bad quotes are excluded individually and reported on the surface.
    ///
    /// # Errors
    ///
    /// Fails on an empty batch, an invalid spot or rate, or when every quote
    /// is excluded.
    pub fn build(
        &self,
        underlying: &UnderlyingId,
        quotes: &[OptionQuote],
        ctx: MarketContext,
    ) -> Result<VolatilitySurface, SurfaceError> {
        if quotes.is_empty() {
            return Err(SurfaceError::EmptyBatch {
                underlying: underlying.clone(),
            });
        }
        if !ctx.spot.is_finite() || ctx.spot <= 0.0 {
            return Err(SurfaceError::InvalidSpot {
                underlying: underlying.clone(),
                spot: ctx.spot,
            });
        }
        if !ctx.rate.is_finite() || !ctx.dividend_yield.is_finite() {
            return Err(SurfaceError::InvalidRate {
                rate: ctx.rate,
                dividend_yield: ctx.dividend_yield,
            });
        }

        let mut points = Vec::with_capacity(quotes.len());
        let mut excluded = Vec::new();
        let mut forwards = BTreeMap::new();

        for quote in quotes {
            match self.solve_quote(underlying, quote, ctx) {
                Ok((point, fwd)) => {
                    forwards.insert(quote.expiry, fwd);
                    points.push(point);
                }
                Err(reason) => {
                    tracing::debug!(
                        underlying = %underlying,
                        contract = %quote.contract(),
                        reason = %reason,
                        "Quote excluded from surface"
                    );
                    observability::record_quote_exclusion(underlying.as_str(), reason.label());
                    excluded.push(ExcludedQuote {
                        quote: quote.clone(),
                        reason,
                    });
                }
            }
        }

        let point_count = points.len();
        let excluded_count = excluded.len();
        let Some(surface) = VolatilitySurface::from_points(
            underlying.clone(),
            ctx.as_of,
            ctx.spot,
            points,
            excluded.clone(),
            &forwards,
        ) else {
            tracing::warn!(
                underlying = %underlying,
                excluded = excluded_count,
                "No valid surface points"
            );
            return Err(SurfaceError::NoValidPoints {
                underlying: underlying.clone(),
                excluded,
            });
        };

        observability::record_surface_build(underlying.as_str(), point_count, excluded_count);
        tracing::debug!(
            underlying = %underlying,
            points = point_count,
            excluded = excluded_count,
            expiries = surface.expiries().len(),
            "Surface built"
        );
        Ok(surface)
    }

    fn solve_quote(
        &self,
        underlying: &UnderlyingId,
        quote: &OptionQuote,
        ctx: MarketContext,
    ) -> Result<(super::VolatilityPoint, f64), ExclusionReason> {
        if &quote.underlying != underlying {
            return Err(ExclusionReason::WrongUnderlying);
        }
        if !quote.is_two_sided() {
            return Err(ExclusionReason::InvalidBidAsk);
        }

        let t = ctx.as_of.years_until(quote.expiry);
        if t <= 0.0 {
            return Err(ExclusionReason::Expired);
        }

        let days = t * DAYS_PER_YEAR;
        let below = self.config.min_dte.is_some_and(|min| days < min);
        let above = self.config.max_dte.is_some_and(|max| days > max);
        if below || above {
            return Err(ExclusionReason::DteOutOfRange { days });
        }

        let relative_spread = quote.relative_spread().ok_or(ExclusionReason::InvalidBidAsk)?;
        if relative_spread > self.config.max_relative_spread {
            return Err(ExclusionReason::SpreadTooWide { relative_spread });
        }

        let thin_volume = quote.volume.is_some_and(|v| v < self.config.min_volume);
        let thin_oi = quote
            .open_interest
            .is_some_and(|oi| oi < self.config.min_open_interest);
        if thin_volume || thin_oi {
            return Err(ExclusionReason::Illiquid);
        }

        let strike = quote
            .strike
            .to_f64()
            .filter(|k| k.is_finite() && *k > 0.0)
            .ok_or_else(|| ExclusionReason::IvFailure {
                cause: format!("strike {} not representable", quote.strike),
            })?;
        let mid = quote
            .mid()
            .to_f64()
            .ok_or_else(|| ExclusionReason::IvFailure {
                cause: format!("mid {} not representable", quote.mid()),
            })?;

        let (s, r, q) = (ctx.spot, ctx.rate, ctx.dividend_yield);
        let iv = self.solver.solve(mid, s, strike, t, r, q, quote.kind)?;
        let greeks = Greeks::compute(s, strike, t, r, q, iv, quote.kind);
        let fwd = forward(s, t, r, q);

        Ok((point_from_quote(quote, iv, greeks, t, fwd, strike), fwd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::OptionKind;
    use crate::domain::surface::pricing::bs_price;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn as_of() -> Timestamp {
        Timestamp::parse("2026-03-02T15:00:00Z").unwrap()
    }

    fn ctx() -> MarketContext {
        MarketContext {
            spot: 100.0,
            rate: 0.05,
            dividend_yield: 0.0,
            as_of: as_of(),
        }
    }

    fn priced_quote(strike: f64, days: i64, kind: OptionKind, sigma: f64) -> OptionQuote {
        let expiry = as_of().plus(Duration::days(days));
        let t = as_of().years_until(expiry);
        let fair = bs_price(100.0, strike, t, 0.05, 0.0, sigma, kind);
        let fair = Decimal::from_f64_retain(fair).unwrap().round_dp(6);
        OptionQuote {
            underlying: "SPY".into(),
            strike: Decimal::from_f64_retain(strike).unwrap(),
            expiry,
            kind,
            bid: fair - dec!(0.000001),
            ask: fair + dec!(0.000001),
            last_trade: as_of(),
            volume: Some(500),
            open_interest: Some(1_000),
        }
    }

    fn chain(days: i64, sigma: f64) -> Vec<OptionQuote> {
        [90.0, 95.0, 100.0, 105.0, 110.0]
            .into_iter()
            .flat_map(|k| {
                [
                    priced_quote(k, days, OptionKind::Call, sigma),
                    priced_quote(k, days, OptionKind::Put, sigma),
                ]
            })
            .collect()
    }

    #[test]
    fn atm_call_recovers_twenty_percent() {
        let engine = VolatilitySurfaceEngine::new(SurfaceConfig::default());
        let quotes = vec![priced_quote(100.0, 30, OptionKind::Call, 0.20)];
        let surface = engine.build(&"SPY".into(), &quotes, ctx()).unwrap();

        assert_eq!(surface.points().len(), 1);
        assert!((surface.points()[0].iv - 0.20).abs() < 1e-4);
    }

    #[test]
    fn flat_surface_has_flat_metrics() {
        let engine = VolatilitySurfaceEngine::new(SurfaceConfig::default());
        let mut quotes = chain(30, 0.25);
        quotes.extend(chain(60, 0.25));
        quotes.extend(chain(90, 0.25));
        let surface = engine.build(&"SPY".into(), &quotes, ctx()).unwrap();
        let m = surface.metrics(engine.wings());

        assert!((m.atm_iv - 0.25).abs() < 1e-3);
        assert!(m.risk_reversal.abs() < 1e-3);
        assert!(m.butterfly.abs() < 1e-3);
        assert!(m.term_slope.unwrap().abs() < 1e-2);
        assert!(m.term_curvature.is_some());
        assert!((surface.iv_at(102.0, 45.0 / 365.25).unwrap() - 0.25).abs() < 1e-3);
    }

    #[test]
    fn iv_lookup_rejects_nonsensical_inputs() {
        let engine = VolatilitySurfaceEngine::new(SurfaceConfig::default());
        let mut quotes = chain(30, 0.25);
        quotes.extend(chain(60, 0.25));
        let surface = engine.build(&"SPY".into(), &quotes, ctx()).unwrap();

        assert!(surface.iv_at(100.0, f64::NAN).is_none());
        assert!(surface.iv_at(-5.0, 45.0 / 365.25).is_none());
        assert!(surface.iv_at(0.0, 45.0 / 365.25).is_none());
        assert!(surface.iv_at(f64::INFINITY, 0.1).is_none());
        assert!(surface.iv_at(100.0, 45.0 / 365.25).is_some());
    }

    #[test]
    fn excludes_bad_quotes_with_reasons() {
        let engine = VolatilitySurfaceEngine::new(SurfaceConfig::default());
        let good = priced_quote(100.0, 30, OptionKind::Call, 0.2);

        let mut other = good.clone();
        other.underlying = "QQQ".into();
        let mut crossed = good.clone();
        crossed.bid = good.ask + dec!(0.1);
        let mut expired = good.clone();
        expired.expiry = as_of().plus(Duration::days(-1));
        let mut below_intrinsic = priced_quote(80.0, 30, OptionKind::Call, 0.2);
        below_intrinsic.bid = dec!(5.00);
        below_intrinsic.ask = dec!(5.02);

        let quotes = vec![good, other, crossed, expired, below_intrinsic];
        let surface = engine.build(&"SPY".into(), &quotes, ctx()).unwrap();

        assert_eq!(surface.points().len(), 1);
        let labels: Vec<&str> = surface.excluded().iter().map(|e| e.reason.label()).collect();
        assert_eq!(
            labels,
            vec!["wrong_underlying", "invalid_bid_ask", "expired", "iv_failure"]
        );
    }

    #[test]
    fn wide_spread_and_illiquid_quotes_are_excluded() {
        let config = SurfaceConfig {
            max_relative_spread: 0.2,
            min_volume: 10,
            ..SurfaceConfig::default()
        };
        let engine = VolatilitySurfaceEngine::new(config);
        let mut wide = priced_quote(100.0, 30, OptionKind::Call, 0.2);
        wide.bid = dec!(1.0);
        wide.ask = dec!(3.0);
        let mut thin = priced_quote(100.0, 30, OptionKind::Put, 0.2);
        thin.volume = Some(2);

        let err = engine.build(&"SPY".into(), &[wide, thin], ctx()).unwrap_err();
        let SurfaceError::NoValidPoints { excluded, .. } = err else {
            panic!("expected NoValidPoints");
        };
        assert!(matches!(excluded[0].reason, ExclusionReason::SpreadTooWide { .. }));
        assert_eq!(excluded[1].reason, ExclusionReason::Illiquid);
    }

    #[test]
    fn dte_window_is_enforced_when_configured() {
        let config = SurfaceConfig {
            min_dte: Some(20.0),
            max_dte: Some(60.0),
            ..SurfaceConfig::default()
        };
        let engine = VolatilitySurfaceEngine::new(config);
        let quotes = vec![
            priced_quote(100.0, 10, OptionKind::Call, 0.2),
            priced_quote(100.0, 30, OptionKind::Call, 0.2),
            priced_quote(100.0, 90, OptionKind::Call, 0.2),
        ];
        let surface = engine.build(&"SPY".into(), &quotes, ctx()).unwrap();
        assert_eq!(surface.points().len(), 1);
        assert_eq!(surface.excluded().len(), 2);
    }

    #[test]
    fn empty_batch_and_bad_spot_fail_fast() {
        let engine = VolatilitySurfaceEngine::new(SurfaceConfig::default());
        assert!(matches!(
            engine.build(&"SPY".into(), &[], ctx()),
            Err(SurfaceError::EmptyBatch { .. })
        ));

        let quotes = vec![priced_quote(100.0, 30, OptionKind::Call, 0.2)];
        let bad = MarketContext {
            spot: -1.0,
            ..ctx()
        };
        assert!(matches!(
            engine.build(&"SPY".into(), &quotes, bad),
            Err(SurfaceError::InvalidSpot { .. })
        ));
        let nan_rate = MarketContext {
            rate: f64::NAN,
            ..ctx()
        };
        assert!(matches!(
            engine.build(&"SPY".into(), &quotes, nan_rate),
            Err(SurfaceError::InvalidRate { .. })
        ));
    }

    #[test]
    fn skewed_chain_has_positive_risk_reversal() {
        let engine = VolatilitySurfaceEngine::new(SurfaceConfig::default());
        let quotes: Vec<OptionQuote> = [(80.0, 0.32), (90.0, 0.26), (100.0, 0.22), (110.0, 0.20), (120.0, 0.19)]
            .into_iter()
            .map(|(k, sigma)| priced_quote(k, 30, OptionKind::Put, sigma))
            .collect();
        let surface = engine.build(&"SPY".into(), &quotes, ctx()).unwrap();
        let m = surface.metrics(engine.wings());
        assert!(m.risk_reversal > 0.05);
        assert!(m.skew_slope < 0.0);
        assert!(m.term_slope.is_none());
    }
}
