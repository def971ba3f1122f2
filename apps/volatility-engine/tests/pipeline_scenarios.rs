//! End-to-end pipeline scenarios: quotes in, surfaces, anomalies, signals,
//! risk decisions and orders out.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use volatility_engine::application::ports::{AuditTrail, MarketSnapshot};
use volatility_engine::config::Config;
use volatility_engine::domain::anomaly::{AnomalySignal, Direction, MetricKind};
use volatility_engine::domain::order::OrderSide;
use volatility_engine::domain::signal::{SignalGenerator, SignalState};
use volatility_engine::domain::surface::pricing::bs_price;
use volatility_engine::domain::surface::{MarketContext, OptionQuote, VolatilitySurfaceEngine};
use volatility_engine::{
    InMemoryAuditSink, OptionKind, OrderPurpose, OrderStatus, SimulatedBroker, StaticQuoteSource,
    Timestamp, TradingPipeline, UnderlyingId,
};

fn as_of() -> Timestamp {
    Timestamp::parse("2026-03-02T15:00:00Z").unwrap()
}

fn quote(strike: f64, days: i64, kind: OptionKind, sigma: f64) -> OptionQuote {
    let expiry = as_of().plus(Duration::days(days));
    let t = as_of().years_until(expiry);
    let fair = bs_price(100.0, strike, t, 0.05, 0.0, sigma, kind);
    let fair = Decimal::from_f64_retain(fair).unwrap().round_dp(4);
    OptionQuote {
        underlying: "SPY".into(),
        strike: Decimal::from_f64_retain(strike).unwrap(),
        expiry,
        kind,
        bid: fair - dec!(0.01),
        ask: fair + dec!(0.01),
        last_trade: as_of(),
        volume: Some(500),
        open_interest: Some(1_000),
    }
}

fn snapshot(sigma: f64) -> MarketSnapshot {
    let quotes = [30, 60]
        .into_iter()
        .flat_map(|days| {
            [90.0, 95.0, 100.0, 105.0, 110.0].into_iter().flat_map(move |k| {
                [
                    quote(k, days, OptionKind::Call, sigma),
                    quote(k, days, OptionKind::Put, sigma),
                ]
            })
        })
        .collect();
    MarketSnapshot {
        underlying: "SPY".into(),
        spot: 100.0,
        quotes,
        as_of: as_of(),
    }
}

fn stable_vol(i: usize) -> f64 {
    if i % 2 == 0 { 0.20 } else { 0.21 }
}

fn four_sigma_vol() -> f64 {
    0.205 + 4.0 * 0.005 * (30.0_f64 / 29.0).sqrt()
}

#[test]
fn atm_call_inverts_to_twenty_percent() {
    let engine = VolatilitySurfaceEngine::new(Config::default().surface);
    let quotes = vec![quote(100.0, 30, OptionKind::Call, 0.20)];
    let ctx = MarketContext {
        spot: 100.0,
        rate: 0.05,
        dividend_yield: 0.0,
        as_of: as_of(),
    };
    let surface = engine.build(&"SPY".into(), &quotes, ctx).unwrap();
    assert_eq!(surface.points().len(), 1);
    assert!((surface.points()[0].iv - 0.20).abs() < 1e-4);
}

struct Harness {
    pipeline: Arc<TradingPipeline>,
    source: Arc<StaticQuoteSource>,
    audit: Arc<InMemoryAuditSink>,
}

fn harness(underlyings: &[&str]) -> Harness {
    let mut config = Config::default();
    config.pipeline.underlyings = underlyings.iter().map(ToString::to_string).collect();
    let source = Arc::new(StaticQuoteSource::new());
    let (tx, rx) = mpsc::channel(64);
    let broker = Arc::new(SimulatedBroker::new(tx));
    let audit = Arc::new(InMemoryAuditSink::new());
    let trail = Arc::new(AuditTrail::new(audit.clone()));
    let pipeline = Arc::new(TradingPipeline::new(&config, source.clone(), broker, trail));
    let _reconciler = pipeline.coordinator().spawn_reconciler(rx);
    Harness {
        pipeline,
        source,
        audit,
    }
}

#[tokio::test]
async fn four_sigma_tick_trades_one_signal() {
    let h = harness(&["SPY"]);
    let spy = UnderlyingId::new("SPY");
    let mut now = as_of();

    for i in 0..30 {
        h.source.publish(snapshot(stable_vol(i)));
        let report = h.pipeline.tick(now).await;
        let spy_report = report.underlying(&spy).unwrap();
        assert_eq!(spy_report.anomalies, 0, "warm-up tick {i}");
        assert_eq!(spy_report.excluded_quotes, 0);
        now = now.plus(Duration::minutes(1));
    }

    h.source.publish(snapshot(four_sigma_vol()));
    let report = h.pipeline.tick(now).await;
    let spy_report = report.underlying(&spy).unwrap();
    assert_eq!(spy_report.anomalies, 1);
    assert_eq!(spy_report.proposals, 1);
    assert_eq!(spy_report.executed, 1);
    assert_eq!(spy_report.entry_orders, 2);

    // Rich ATM vol sells the straddle.
    let orders = h.pipeline.coordinator().orders().await;
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.side() == OrderSide::Sell));
    assert!(orders.iter().all(|o| o.purpose() == OrderPurpose::Entry));

    let mut filled = false;
    for _ in 0..100 {
        let orders = h.pipeline.coordinator().orders().await;
        if orders.iter().all(|o| o.status() == OrderStatus::Filled) {
            filled = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(filled);

    let ledger = h.pipeline.coordinator().ledger_snapshot().await;
    assert_eq!(ledger.open.len(), 2);
    assert_eq!(h.audit.of_kind("risk_decision").len(), 1);
    assert!(!h.audit.of_kind("signal").is_empty());

    // Both legs are terminal, so the signal no longer holds a reservation.
    let state = h.pipeline.state().lock().await;
    assert!(state.signal_entries.is_empty());
    assert_eq!(state.finished_orders(), 2);
}

#[tokio::test]
async fn underlying_without_data_is_skipped() {
    let h = harness(&["SPY", "QQQ"]);
    h.source.publish(snapshot(0.20));

    let report = h.pipeline.tick(as_of()).await;
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].underlying, UnderlyingId::new("SPY"));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, UnderlyingId::new("QQQ"));
    assert!(report.skipped[0].1.contains("No market data"));
}

#[tokio::test]
async fn stale_snapshot_is_not_reused_after_withdrawal() {
    let h = harness(&["SPY"]);
    h.source.publish(snapshot(0.20));
    assert_eq!(h.pipeline.tick(as_of()).await.processed.len(), 1);

    h.source.clear(&"SPY".into());
    let report = h.pipeline.tick(as_of().plus(Duration::minutes(1))).await;
    assert!(report.processed.is_empty());
    assert_eq!(report.skipped.len(), 1);
}

fn anomaly(metric: MetricKind, z: f64, at: Timestamp) -> AnomalySignal {
    let pattern = metric.pattern();
    AnomalySignal {
        underlying: "SPY".into(),
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

#[test]
fn proposal_past_ttl_expires_instead_of_approving() {
    let engine = VolatilitySurfaceEngine::new(Config::default().surface);
    let snap = snapshot(0.20);
    let surface = engine
        .build(
            &snap.underlying,
            &snap.quotes,
            MarketContext {
                spot: snap.spot,
                rate: 0.05,
                dividend_yield: 0.0,
                as_of: snap.as_of,
            },
        )
        .unwrap();

    let mut generator = SignalGenerator::new(Config::default().signals);
    let now = as_of();
    let changed = generator.evaluate(&[anomaly(MetricKind::AtmIv, -4.0, now)], &surface, now);
    let proposal = changed
        .iter()
        .find(|s| s.state() == SignalState::Proposed)
        .unwrap();
    assert_eq!(proposal.direction, Direction::LongVolatility);

    let late = now.plus(Duration::seconds(61));
    let decided = generator.record_decision(&proposal.id, true, late).unwrap();
    assert_eq!(decided.state(), SignalState::Expired);
    assert!(generator.outstanding(&"SPY".into()).is_none());
}
