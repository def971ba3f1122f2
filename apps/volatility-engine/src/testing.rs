//! Shared fixtures for unit tests.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::SurfaceConfig;
use crate::domain::anomaly::{AnomalyPattern, AnomalySignal, MetricKind};
use crate::domain::shared::{OptionKind, Timestamp, UnderlyingId};
use crate::domain::surface::pricing::bs_price;
use crate::domain::surface::{MarketContext, OptionQuote, VolatilitySurface, VolatilitySurfaceEngine};

pub fn as_of() -> Timestamp {
    Timestamp::parse("2026-03-02T15:00:00Z").unwrap()
}

pub fn ctx() -> MarketContext {
    MarketContext {
        spot: 100.0,
        rate: 0.05,
        dividend_yield: 0.0,
        as_of: as_of(),
    }
}

/// Quote priced at `sigma` with a 10 cent wide market around fair value.
pub fn quote(strike: f64, days: i64, kind: OptionKind, sigma: f64) -> OptionQuote {
    let expiry = as_of().plus(Duration::days(days));
    let t = as_of().years_until(expiry);
    let fair = bs_price(100.0, strike, t, 0.05, 0.0, sigma, kind);
    let fair = Decimal::from_f64_retain(fair).unwrap().round_dp(2);
    OptionQuote {
        underlying: "SPY".into(),
        strike: Decimal::from_f64_retain(strike).unwrap(),
        expiry,
        kind,
        bid: fair - dec!(0.05),
        ask: fair + dec!(0.05),
        last_trade: as_of(),
        volume: Some(500),
        open_interest: Some(1_000),
    }
}

pub fn chain(days: i64, sigma: f64) -> Vec<OptionQuote> {
    [90.0, 95.0, 100.0, 105.0, 110.0]
        .into_iter()
        .flat_map(|k| {
            [
                quote(k, days, OptionKind::Call, sigma),
                quote(k, days, OptionKind::Put, sigma),
            ]
        })
        .collect()
}

/// Two-expiry SPY surface at a flat 20% vol.
pub fn surface() -> VolatilitySurface {
    let mut quotes = chain(30, 0.20);
    quotes.extend(chain(60, 0.20));
    VolatilitySurfaceEngine::new(SurfaceConfig::default())
        .build(&"SPY".into(), &quotes, ctx())
        .unwrap()
}

pub fn anomaly(metric: MetricKind, z: f64, at: Timestamp) -> AnomalySignal {
    let pattern: AnomalyPattern = metric.pattern();
    AnomalySignal {
        underlying: UnderlyingId::new("SPY"),
        pattern,
        metric,
        magnitude: z,
        observed: 0.0,
        baseline_mean: 0.0,
        baseline_std: 0.01,
        timestamp: at,
        direction: pattern.direction(z),
        iv_rank: None,
        iv_percentile: None,
    }
}
