//! Risk gate: evaluates proposals and reserves capital atomically.

use std::sync::Arc;

use super::state::SharedState;
use crate::application::ports::{AuditRecord, AuditTrail};
use crate::domain::risk::{RiskDecision, RiskManager};
use crate::domain::shared::SignalId;
use crate::domain::signal::TradeSignal;
use crate::observability;

/// Serializes risk evaluation against shared capital.
#[derive(Debug)]
pub struct RiskGate {
    manager: RiskManager,
    state: SharedState,
    audit: Arc<AuditTrail>,
}

impl RiskGate {
    /// Create a gate over shared state.
    #[must_use]
    pub const fn new(manager: RiskManager, state: SharedState, audit: Arc<AuditTrail>) -> Self {
        Self {
            manager,
            state,
            audit,
        }
    }

    /// Evaluate a proposal and, if approved, reserve its notional before the
    /// lock is released.
    pub async fn evaluate(&self, signal: &TradeSignal, realized_vol: Option<f64>) -> RiskDecision {
        let mut state = self.state.lock().await;
        let snapshot = state.portfolio_snapshot();
        let decision = self.manager.evaluate(signal, &snapshot, realized_vol);

        match &decision {
            RiskDecision::Approved(trade) => {
                state.capital.reserve(
                    trade.signal_id.clone(),
                    trade.underlying.clone(),
                    trade.notional,
                );
                tracing::info!(
                    signal_id = %signal.id,
                    quantity = trade.quantity,
                    notional = %trade.notional,
                    stop_loss = %trade.stop_loss,
                    max_loss = %trade.max_loss,
                    "Risk approved"
                );
                observability::record_risk_decision(true, "");
            }
            RiskDecision::Rejected(rejection) => {
                tracing::info!(
                    signal_id = %signal.id,
                    constraint = %rejection.constraint,
                    reason = %rejection.reason,
                    "Risk rejected"
                );
                observability::record_risk_decision(false, rejection.constraint.label());
            }
        }
        drop(state);

        self.audit.emit(AuditRecord::RiskDecision {
            decision: decision.clone(),
        });
        decision
    }

    /// Drop a reservation for a signal that will not execute.
    pub async fn release(&self, signal_id: &SignalId) {
        let released = self.state.lock().await.capital.release(signal_id);
        if let Some(amount) = released {
            tracing::info!(signal_id = %signal_id, amount = %amount, "Reservation released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoOpAuditSink;
    use crate::application::services::TradingState;
    use crate::config::RiskConfig;
    use crate::domain::anomaly::Direction;
    use crate::domain::order::OrderSide;
    use crate::domain::shared::{OptionContract, OptionKind, UnderlyingId};
    use crate::domain::signal::SignalLeg;
    use crate::testing::as_of;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn signal(underlying: &str, ask: Decimal) -> TradeSignal {
        let leg = SignalLeg {
            contract: OptionContract::new(
                UnderlyingId::new(underlying),
                dec!(100),
                as_of().plus(Duration::days(30)),
                OptionKind::Call,
            ),
            side: OrderSide::Buy,
            bid: ask - dec!(0.1),
            ask,
        };
        TradeSignal::new(
            underlying.into(),
            Direction::Bullish,
            vec![leg],
            0.5,
            Vec::new(),
            as_of(),
            as_of().plus(Duration::seconds(60)),
        )
    }

    fn gate(equity: Decimal, config: RiskConfig) -> RiskGate {
        let state = TradingState::new(equity, config.contract_multiplier).shared();
        RiskGate::new(
            RiskManager::new(config),
            state,
            Arc::new(AuditTrail::new(Arc::new(NoOpAuditSink))),
        )
    }

    #[tokio::test]
    async fn approval_reserves_capital() {
        let gate = gate(dec!(100000), RiskConfig::default());
        let s = signal("SPY", dec!(2));
        let decision = gate.evaluate(&s, None).await;
        assert!(decision.is_approved());

        let snap = gate.state.lock().await.portfolio_snapshot();
        assert_eq!(snap.available_capital, dec!(98000));
        assert_eq!(snap.exposure_for(&"SPY".into()), dec!(2000));

        gate.release(&s.id).await;
        let snap = gate.state.lock().await.portfolio_snapshot();
        assert_eq!(snap.available_capital, dec!(100000));
    }

    #[tokio::test]
    async fn insufficient_capital_scenario() {
        let gate = gate(dec!(10000), RiskConfig::default());
        let decision = gate.evaluate(&signal("SPY", dec!(150)), None).await;
        assert_eq!(decision.size(), 0);
        let RiskDecision::Rejected(rejection) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.constraint.to_string(), "insufficient capital");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_evaluations_respect_portfolio_cap() {
        let config = RiskConfig {
            sizing: crate::domain::risk::SizingRule::FixedFraction { fraction: dec!(0.2) },
            ..RiskConfig::default()
        };
        let gate = Arc::new(gate(dec!(100000), config));
        let mut handles = Vec::new();
        for name in ["SPY", "QQQ", "IWM", "DIA", "XLF", "XLE"] {
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                gate.evaluate(&signal(name, dec!(5)), None).await
            }));
        }
        let mut total = Decimal::ZERO;
        for h in handles {
            if let RiskDecision::Approved(trade) = h.await.unwrap() {
                total += trade.notional;
            }
        }
        assert!(total <= dec!(60000));
        assert_eq!(total, dec!(60000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_evaluations_on_one_underlying_respect_its_cap() {
        let config = RiskConfig {
            sizing: crate::domain::risk::SizingRule::FixedFraction { fraction: dec!(0.1) },
            ..RiskConfig::default()
        };
        let gate = Arc::new(gate(dec!(100000), config));
        let (s1, s2, s3, s4) = (
            signal("SPY", dec!(5)),
            signal("SPY", dec!(5)),
            signal("SPY", dec!(5)),
            signal("SPY", dec!(5)),
        );
        let (a, b, c, d) = tokio::join!(
            gate.evaluate(&s1, None),
            gate.evaluate(&s2, None),
            gate.evaluate(&s3, None),
            gate.evaluate(&s4, None),
        );
        let total: Decimal = [a, b, c, d]
            .iter()
            .filter_map(|decision| match decision {
                RiskDecision::Approved(trade) => Some(trade.notional),
                RiskDecision::Rejected(_) => None,
            })
            .sum();
        assert_eq!(total, dec!(25000));
        let snap = gate.state.lock().await.portfolio_snapshot();
        assert_eq!(snap.exposure_for(&"SPY".into()), total);
    }

    proptest! {
        #[test]
        fn approved_exposure_never_exceeds_portfolio_cap(
            asks in prop::collection::vec(1u32..40, 1..25),
        ) {
            tokio_test::block_on(async {
                let gate = gate(dec!(50000), RiskConfig::default());
                let names = ["SPY", "QQQ", "IWM", "DIA", "XLF", "XLE", "XLK"];
                let mut total = Decimal::ZERO;
                for (i, ask) in asks.iter().enumerate() {
                    let s = signal(names[i % names.len()], Decimal::from(*ask) / dec!(4));
                    if let RiskDecision::Approved(trade) = gate.evaluate(&s, None).await {
                        total += trade.notional;
                    }
                }
                assert!(total <= dec!(50000) * dec!(0.60));
            });
        }
    }
}
