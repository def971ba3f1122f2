//! Order execution against the simulated broker: retry on timeouts, broker
//! rejections, fill reconciliation and exit priority.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use volatility_engine::application::ports::AuditTrail;
use volatility_engine::application::retry::RetryPolicy;
use volatility_engine::application::services::{ExecutionCoordinator, RiskGate, TradingState};
use volatility_engine::config::{ExecutionConfig, RiskConfig};
use volatility_engine::domain::anomaly::Direction;
use volatility_engine::domain::ledger::LedgerFill;
use volatility_engine::domain::order::{FillOutcome, OrderPurpose, OrderSide};
use volatility_engine::domain::risk::{ApprovedTrade, RiskDecision, RiskManager};
use volatility_engine::domain::shared::{FillId, OrderId, PositionId};
use volatility_engine::domain::signal::{SignalLeg, TradeSignal};
use volatility_engine::infrastructure::{FillMode, SubmitBehavior};
use volatility_engine::{
    BrokerError, FillNotification, InMemoryAuditSink, OptionContract, OptionKind, OrderStatus,
    PositionStatus, SimulatedBroker, Timestamp,
};

fn as_of() -> Timestamp {
    Timestamp::parse("2026-03-02T15:00:00Z").unwrap()
}

fn contract() -> OptionContract {
    OptionContract::new(
        "SPY".into(),
        dec!(100),
        as_of().plus(chrono::Duration::days(30)),
        OptionKind::Call,
    )
}

fn put_contract() -> OptionContract {
    OptionContract::new(
        "SPY".into(),
        dec!(100),
        as_of().plus(chrono::Duration::days(30)),
        OptionKind::Put,
    )
}

fn leg(contract: OptionContract, ask: Decimal) -> SignalLeg {
    SignalLeg {
        contract,
        side: OrderSide::Buy,
        bid: ask - dec!(0.1),
        ask,
    }
}

fn signal_with(direction: Direction, legs: Vec<SignalLeg>) -> TradeSignal {
    TradeSignal::new(
        "SPY".into(),
        direction,
        legs,
        0.6,
        Vec::new(),
        as_of(),
        as_of().plus(chrono::Duration::seconds(60)),
    )
}

fn signal(ask: Decimal) -> TradeSignal {
    signal_with(Direction::Bullish, vec![leg(contract(), ask)])
}

fn straddle() -> TradeSignal {
    signal_with(
        Direction::LongVolatility,
        vec![leg(contract(), dec!(2)), leg(put_contract(), dec!(2))],
    )
}

struct Harness {
    broker: Arc<SimulatedBroker>,
    coordinator: Arc<ExecutionCoordinator>,
    gate: RiskGate,
    audit: Arc<InMemoryAuditSink>,
}

fn harness() -> Harness {
    harness_with(
        RetryPolicy {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        },
        20,
    )
}

fn harness_with(retry: RetryPolicy, submit_timeout_ms: u64) -> Harness {
    let (tx, rx) = mpsc::channel(64);
    let broker = Arc::new(SimulatedBroker::new(tx).with_hang(Duration::from_millis(200)));
    let audit = Arc::new(InMemoryAuditSink::new());
    let trail = Arc::new(AuditTrail::new(audit.clone()));
    let risk = RiskConfig::default();
    let state = TradingState::new(dec!(100000), risk.contract_multiplier).shared();
    let execution = ExecutionConfig {
        submit_timeout_ms,
        cancel_timeout_ms: 50,
        retry,
        ..ExecutionConfig::default()
    };
    let gate = RiskGate::new(
        RiskManager::new(risk.clone()),
        Arc::clone(&state),
        Arc::clone(&trail),
    );
    let coordinator = Arc::new(ExecutionCoordinator::new(
        broker.clone(),
        state,
        trail,
        execution,
        &risk,
    ));
    let _reconciler = coordinator.spawn_reconciler(rx);
    Harness {
        broker,
        coordinator,
        gate,
        audit,
    }
}

async fn approve(h: &Harness, s: &TradeSignal) -> ApprovedTrade {
    match h.gate.evaluate(s, None).await {
        RiskDecision::Approved(trade) => trade,
        RiskDecision::Rejected(rejection) => panic!("unexpected rejection: {}", rejection.reason),
    }
}

async fn wait_for_status(h: &Harness, id: &OrderId, status: OrderStatus) {
    for _ in 0..100 {
        if h.coordinator.order(id).await.map(|o| o.status()) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("order {id} never reached {status}");
}

async fn is_reserved(h: &Harness, s: &TradeSignal) -> bool {
    h.coordinator.state().lock().await.capital.is_reserved(&s.id)
}

#[tokio::test]
async fn two_timeouts_then_success_fills_once() {
    let h = harness();
    h.broker.script([SubmitBehavior::Hang, SubmitBehavior::Hang]);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];

    assert_eq!(h.broker.submit_calls(), 3);
    assert_eq!(order.attempts(), 3);
    wait_for_status(&h, order.id(), OrderStatus::Filled).await;

    let filled = h.coordinator.order(order.id()).await.unwrap();
    assert_eq!(filled.cum_qty(), trade.quantity);
    let ledger = h.coordinator.ledger_snapshot().await;
    assert_eq!(ledger.open.len(), 1);
    assert_eq!(ledger.open[0].quantity(), trade.quantity);
    assert!(!is_reserved(&h, &s).await);
    assert!(h.audit.of_kind("alert").is_empty());
}

#[tokio::test]
async fn exhausted_retries_reject_and_alert() {
    let h = harness();
    h.broker
        .script([SubmitBehavior::Hang, SubmitBehavior::Hang, SubmitBehavior::Hang]);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    let order = &orders[0];

    assert_eq!(h.broker.submit_calls(), 3);
    assert_eq!(order.status(), OrderStatus::Rejected);
    assert!(
        order
            .reject_reason()
            .unwrap()
            .starts_with("retries exhausted after 3 attempts")
    );
    assert_eq!(h.audit.of_kind("alert").len(), 1);

    let ledger = h.coordinator.ledger_snapshot().await;
    assert!(ledger.open.is_empty());
    assert_eq!(ledger.closed.len(), 1);
    assert!(!is_reserved(&h, &s).await);
}

#[tokio::test]
async fn broker_rejection_is_not_retried() {
    let h = harness();
    h.broker.script([SubmitBehavior::Fail(BrokerError::Rejected {
        reason: "contract not tradable".into(),
    })]);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();

    assert_eq!(h.broker.submit_calls(), 1);
    assert_eq!(orders[0].status(), OrderStatus::Rejected);
    assert!(h.audit.of_kind("alert").is_empty());
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let h = harness();
    h.broker.script([SubmitBehavior::Fail(BrokerError::Transient {
        message: "rate limited".into(),
    })]);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();

    assert_eq!(h.broker.submit_calls(), 2);
    wait_for_status(&h, orders[0].id(), OrderStatus::Filled).await;
}

#[tokio::test]
async fn duplicate_fill_is_applied_once() {
    let h = harness();
    h.broker.set_fill_mode(FillMode::Resting);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    let id = orders[0].id().clone();
    assert_eq!(orders[0].status(), OrderStatus::Submitted);

    let fill = FillNotification {
        fill_id: FillId::new("EXEC-1"),
        order_id: id.clone(),
        quantity: 4,
        price: dec!(2),
        timestamp: as_of(),
    };
    let first = h.coordinator.handle_fill(fill.clone()).await.unwrap();
    assert_eq!(
        first,
        FillOutcome::Applied {
            status: OrderStatus::PartiallyFilled
        }
    );
    let second = h.coordinator.handle_fill(fill).await.unwrap();
    assert_eq!(second, FillOutcome::Duplicate);

    assert_eq!(h.coordinator.order(&id).await.unwrap().cum_qty(), 4);
    let ledger = h.coordinator.ledger_snapshot().await;
    assert_eq!(ledger.open[0].quantity(), 4);
    // Still working, so the reservation stands.
    assert!(is_reserved(&h, &s).await);
}

#[tokio::test]
async fn exit_blocks_new_entry_on_same_contract() {
    let h = harness();

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    wait_for_status(&h, orders[0].id(), OrderStatus::Filled).await;

    // Stop sits at half the entry premium.
    h.broker.set_fill_mode(FillMode::Resting);
    let exits = h
        .coordinator
        .process_exits(&[(contract(), dec!(0.9))], as_of())
        .await
        .unwrap();
    assert_eq!(exits.len(), 1);
    let exit = h.coordinator.order(&exits[0]).await.unwrap();
    assert_eq!(exit.side(), OrderSide::Sell);
    assert_eq!(exit.quantity(), trade.quantity);
    assert_eq!(exit.status(), OrderStatus::Submitted);

    // A second pass does not issue another exit.
    let again = h
        .coordinator
        .process_exits(&[(contract(), dec!(0.8))], as_of())
        .await
        .unwrap();
    assert!(again.is_empty());

    let next = signal(dec!(2));
    let next_trade = approve(&h, &next).await;
    let entries = h
        .coordinator
        .execute(&next_trade, &next, as_of())
        .await
        .unwrap();
    assert!(entries.is_empty());
    assert!(!is_reserved(&h, &next).await);
}

#[tokio::test]
async fn exit_fill_realizes_pnl() {
    let h = harness();

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    wait_for_status(&h, orders[0].id(), OrderStatus::Filled).await;

    let exits = h
        .coordinator
        .process_exits(&[(contract(), dec!(0.9))], as_of())
        .await
        .unwrap();
    wait_for_status(&h, &exits[0], OrderStatus::Filled).await;

    let ledger = h.coordinator.ledger_snapshot().await;
    assert!(ledger.open.is_empty());
    let expected = (dec!(0.9) - dec!(2)) * Decimal::from(trade.quantity) * dec!(100);
    assert_eq!(ledger.realized_pnl, expected);
    let equity = h.coordinator.state().lock().await.capital.equity();
    assert_eq!(equity, dec!(100000) + expected);
}

#[tokio::test]
async fn late_fill_after_cancel_is_booked() {
    let h = harness();
    h.broker.set_fill_mode(FillMode::Resting);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    let id = orders[0].id().clone();

    let status = h.coordinator.cancel(&id).await.unwrap();
    assert_eq!(status, OrderStatus::Cancelled);
    assert_eq!(h.broker.cancels().len(), 1);
    assert!(h.coordinator.ledger_snapshot().await.open.is_empty());
    assert!(!is_reserved(&h, &s).await);

    let outcome = h
        .coordinator
        .handle_fill(FillNotification {
            fill_id: FillId::new("EXEC-LATE"),
            order_id: id.clone(),
            quantity: trade.quantity,
            price: dec!(2),
            timestamp: as_of(),
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        FillOutcome::Late {
            status: OrderStatus::Cancelled
        }
    );

    assert_eq!(
        h.coordinator.order(&id).await.unwrap().status(),
        OrderStatus::Cancelled
    );
    let ledger = h.coordinator.ledger_snapshot().await;
    assert_eq!(ledger.open.len(), 1);
    assert_eq!(ledger.open[0].status(), PositionStatus::Open);
    assert_eq!(ledger.open[0].quantity(), trade.quantity);
}

#[tokio::test]
async fn cancel_of_rejected_order_is_a_no_op() {
    let h = harness();

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    h.broker.script([
        SubmitBehavior::Fail(BrokerError::Rejected {
            reason: "closed".into(),
        }),
    ]);
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    let id = orders[0].id().clone();

    assert_eq!(
        h.coordinator.cancel(&id).await.unwrap(),
        OrderStatus::Rejected
    );
    assert!(h.broker.cancels().is_empty());
}

#[tokio::test]
async fn ledger_violation_halts_until_cleared() {
    let h = harness();
    h.broker.set_fill_mode(FillMode::Resting);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    let id = orders[0].id().clone();

    // An exit fill against a position that never opened contradicts the book.
    let booked = {
        let mut state = h.coordinator.state().lock().await;
        let position_id = state.orders.get(&id).unwrap().position_id.clone();
        state.ledger.apply_fill(&LedgerFill {
            fill_id: FillId::new("BAD-1"),
            position_id,
            side: OrderSide::Sell,
            purpose: OrderPurpose::StopLoss,
            quantity: 1,
            price: dec!(1),
            timestamp: as_of(),
        })
    };
    assert!(booked.is_err());
    assert_eq!(h.coordinator.ledger_snapshot().await.halted.len(), 1);

    let next = signal(dec!(2));
    let next_trade = approve(&h, &next).await;
    assert!(
        h.coordinator
            .execute(&next_trade, &next, as_of())
            .await
            .unwrap()
            .is_empty()
    );

    assert!(h.coordinator.clear_halt(&contract()).await);
    assert!(h.coordinator.ledger_snapshot().await.halted.is_empty());
    assert!(!h.coordinator.clear_halt(&contract()).await);
}

#[tokio::test]
async fn cancel_during_backoff_withdraws_the_entry() {
    let h = harness_with(
        RetryPolicy {
            initial_backoff_ms: 150,
            max_backoff_ms: 150,
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        },
        20,
    );
    h.broker.script([SubmitBehavior::Fail(BrokerError::Transient {
        message: "rate limited".into(),
    })]);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let running = {
        let coordinator = Arc::clone(&h.coordinator);
        let s = s.clone();
        tokio::spawn(async move { coordinator.execute(&trade, &s, as_of()).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let id = h.coordinator.orders().await[0].id().clone();
    assert_eq!(
        h.coordinator.cancel(&id).await.unwrap(),
        OrderStatus::Cancelled
    );

    let orders = running.await.unwrap().unwrap();
    assert_eq!(orders[0].status(), OrderStatus::Cancelled);
    assert_eq!(h.broker.submit_calls(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.coordinator.ledger_snapshot().await.open.is_empty());
    assert!(!is_reserved(&h, &s).await);
}

#[tokio::test]
async fn rejected_first_leg_withdraws_the_rest() {
    let h = harness();
    h.broker.script([SubmitBehavior::Fail(BrokerError::Rejected {
        reason: "contract not tradable".into(),
    })]);

    let s = straddle();
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();

    assert_eq!(h.broker.submit_calls(), 1);
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].status(), OrderStatus::Rejected);
    assert_eq!(orders[1].status(), OrderStatus::Cancelled);
    assert_eq!(orders[1].attempts(), 0);
    assert!(h.coordinator.ledger_snapshot().await.open.is_empty());
    assert!(!is_reserved(&h, &s).await);
}

#[tokio::test]
async fn rejected_second_leg_cancels_the_working_first() {
    let h = harness();
    h.broker.set_fill_mode(FillMode::Resting);
    h.broker.script([
        SubmitBehavior::Accept,
        SubmitBehavior::Fail(BrokerError::Rejected {
            reason: "contract not tradable".into(),
        }),
    ]);

    let s = straddle();
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();

    assert_eq!(h.broker.submit_calls(), 2);
    assert_eq!(orders[0].status(), OrderStatus::Cancelled);
    assert_eq!(orders[1].status(), OrderStatus::Rejected);
    assert_eq!(h.broker.cancels().len(), 1);
    assert!(h.broker.working().is_empty());
    assert!(h.coordinator.ledger_snapshot().await.open.is_empty());
    assert!(!is_reserved(&h, &s).await);
    // Nothing filled, so no unhedged-leg alert.
    assert!(h.audit.of_kind("alert").is_empty());
}

#[tokio::test]
async fn refused_fill_is_not_remembered_by_the_order() {
    let h = harness();
    h.broker.set_fill_mode(FillMode::Resting);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let orders = h.coordinator.execute(&trade, &s, as_of()).await.unwrap();
    let id = orders[0].id().clone();

    let position_id = {
        let mut state = h.coordinator.state().lock().await;
        let tracked = state.orders.get_mut(&id).unwrap();
        std::mem::replace(&mut tracked.position_id, PositionId::generate())
    };
    let fill = FillNotification {
        fill_id: FillId::new("EXEC-7"),
        order_id: id.clone(),
        quantity: trade.quantity,
        price: dec!(2),
        timestamp: as_of(),
    };
    assert!(h.coordinator.handle_fill(fill.clone()).await.is_err());

    let order = h.coordinator.order(&id).await.unwrap();
    assert_eq!(order.cum_qty(), 0);
    assert_eq!(order.status(), OrderStatus::Submitted);
    assert_eq!(h.audit.of_kind("alert").len(), 1);

    // Once the mapping is repaired the redelivered fill is booked.
    h.coordinator
        .state()
        .lock()
        .await
        .orders
        .get_mut(&id)
        .unwrap()
        .position_id = position_id;
    let outcome = h.coordinator.handle_fill(fill).await.unwrap();
    assert_eq!(
        outcome,
        FillOutcome::Applied {
            status: OrderStatus::Filled
        }
    );
    let ledger = h.coordinator.ledger_snapshot().await;
    assert_eq!(ledger.open.len(), 1);
    assert_eq!(ledger.open[0].quantity(), trade.quantity);
}

#[tokio::test]
async fn fill_during_final_attempt_is_not_reported_abandoned() {
    let h = harness_with(
        RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
        100,
    );
    h.broker.script([SubmitBehavior::Hang]);

    let s = signal(dec!(2));
    let trade = approve(&h, &s).await;
    let quantity = trade.quantity;
    let running = {
        let coordinator = Arc::clone(&h.coordinator);
        let s = s.clone();
        tokio::spawn(async move { coordinator.execute(&trade, &s, as_of()).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    let id = h.coordinator.orders().await[0].id().clone();
    h.coordinator
        .handle_fill(FillNotification {
            fill_id: FillId::new("EXEC-EARLY"),
            order_id: id.clone(),
            quantity,
            price: dec!(2),
            timestamp: as_of(),
        })
        .await
        .unwrap();

    let orders = running.await.unwrap().unwrap();
    assert_eq!(h.broker.submit_calls(), 1);
    assert_eq!(orders[0].status(), OrderStatus::Filled);
    assert!(h.audit.of_kind("alert").is_empty());
    assert_eq!(h.coordinator.ledger_snapshot().await.open.len(), 1);
}
