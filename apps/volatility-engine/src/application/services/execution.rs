//! Execution coordinator.
//!
//! Turns approved trades into broker orders, submits them with bounded
//! retry, issues exit orders ahead of new entries and reconciles fills into
//! the position ledger. Fills are the source of truth: a fill that arrives
//! after a cancel or rejection is still booked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::state::{SharedState, TrackedOrder, TradingState};
use crate::application::ports::{
    AuditRecord, AuditTrail, BrokerError, BrokerPort, SubmitOrderRequest,
};
use crate::application::retry::ExponentialBackoffCalculator;
use crate::config::{ExecutionConfig, RiskConfig};
use crate::domain::ledger::{LedgerFill, LedgerOutcome, LedgerSnapshot, PositionStatus};
use crate::domain::order::{
    FillNotification, FillOutcome, Order, OrderError, OrderPurpose, OrderStatus,
};
use crate::domain::risk::ApprovedTrade;
use crate::domain::shared::{BrokerOrderId, OptionContract, OrderId, Timestamp};
use crate::domain::signal::TradeSignal;
use crate::error::EngineError;
use crate::observability;

/// Smallest limit price an exit order is sent with.
const MIN_TICK: Decimal = dec!(0.01);

/// Coordinates orders between the engine and the broker.
pub struct ExecutionCoordinator {
    broker: Arc<dyn BrokerPort>,
    state: SharedState,
    audit: Arc<AuditTrail>,
    config: ExecutionConfig,
    stop_loss_pct: Decimal,
    take_profit_pct: Option<Decimal>,
}

impl std::fmt::Debug for ExecutionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCoordinator")
            .field("config", &self.config)
            .field("stop_loss_pct", &self.stop_loss_pct)
            .field("take_profit_pct", &self.take_profit_pct)
            .finish_non_exhaustive()
    }
}

impl ExecutionCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        broker: Arc<dyn BrokerPort>,
        state: SharedState,
        audit: Arc<AuditTrail>,
        config: ExecutionConfig,
        risk: &RiskConfig,
    ) -> Self {
        Self {
            broker,
            state,
            audit,
            config,
            stop_loss_pct: risk.stop_loss_pct,
            take_profit_pct: risk.take_profit_pct,
        }
    }

    /// Shared trading state.
    #[must_use]
    pub const fn state(&self) -> &SharedState {
        &self.state
    }

    /// Execute an approved trade: one entry order and one pending position
    /// per leg. Entries on an instrument that is exiting or halted are
    /// dropped and the reservation is released.
    ///
    /// # Errors
    ///
    /// Returns an error if an order cannot be built for a leg.
    pub async fn execute(
        &self,
        trade: &ApprovedTrade,
        signal: &TradeSignal,
        now: Timestamp,
    ) -> Result<Vec<Order>, EngineError> {
        let order_ids = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if let Some(leg) = signal.legs.iter().find(|leg| {
                state.ledger.exit_pending_for(&leg.contract) || state.ledger.is_halted(&leg.contract)
            }) {
                tracing::info!(
                    signal_id = %signal.id,
                    contract = %leg.contract,
                    "Entry dropped, instrument exiting or halted"
                );
                state.capital.release(&signal.id);
                return Ok(Vec::new());
            }

            let orders = signal
                .legs
                .iter()
                .map(|leg| {
                    Order::new(
                        leg.contract.clone(),
                        leg.side,
                        OrderPurpose::Entry,
                        trade.quantity,
                        leg.limit_price(),
                        Some(signal.id.clone()),
                        now,
                    )
                })
                .collect::<Result<Vec<_>, _>>();
            let orders = match orders {
                Ok(orders) => orders,
                Err(error) => {
                    state.capital.release(&signal.id);
                    return Err(error.into());
                }
            };

            let mut ids = Vec::with_capacity(orders.len());
            for order in orders {
                let position_id = state.ledger.open_pending(
                    signal.id.clone(),
                    order.contract().clone(),
                    order.side(),
                    order.quantity(),
                    self.stop_loss_pct,
                    self.take_profit_pct,
                    now,
                )?;
                self.audit.emit(AuditRecord::order(&order));
                ids.push(order.id().clone());
                state
                    .orders
                    .insert(order.id().clone(), TrackedOrder { order, position_id });
            }
            state.signal_entries.insert(signal.id.clone(), ids.clone());
            ids
        };

        for (i, id) in order_ids.iter().enumerate() {
            let status = self.submit_with_retry(id).await?;
            if matches!(status, OrderStatus::Rejected | OrderStatus::Cancelled) {
                self.abort_siblings(signal, id, &order_ids[..i], &order_ids[i + 1..])
                    .await;
                break;
            }
        }

        let state = self.state.lock().await;
        Ok(order_ids
            .iter()
            .filter_map(|id| state.orders.get(id).map(|t| t.order.clone()))
            .collect())
    }

    /// Submit a created order. Timeouts and transient failures are retried
    /// with backoff up to the configured ceiling; exhaustion or a broker
    /// rejection marks the order rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown.
    pub async fn submit_with_retry(&self, order_id: &OrderId) -> Result<OrderStatus, EngineError> {
        let request = {
            let state = self.state.lock().await;
            let tracked = find_order(&state, order_id)?;
            if tracked.order.status() != OrderStatus::Created {
                return Ok(tracked.order.status());
            }
            SubmitOrderRequest::from_order(&tracked.order)
        };

        let call_timeout = Duration::from_millis(self.config.submit_timeout_ms);
        let mut backoff = ExponentialBackoffCalculator::new(&self.config.retry);
        let started = Instant::now();

        loop {
            let attempts = {
                let mut state = self.state.lock().await;
                let order = &mut find_order_mut(&mut state, order_id)?.order;
                if order.status() != OrderStatus::Created || order.cancel_requested() {
                    tracing::info!(
                        order_id = %order_id,
                        status = %order.status(),
                        "Order withdrawn before resubmission"
                    );
                    return Ok(order.status());
                }
                order.record_attempt();
                order.attempts()
            };

            let result =
                match tokio::time::timeout(call_timeout, self.broker.submit_order(request.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(BrokerError::Timeout {
                        elapsed_ms: self.config.submit_timeout_ms,
                    }),
                };

            match result {
                Ok(ack) => {
                    let broker_order_id = ack.broker_order_id;
                    let (status, cancel_now) = {
                        let mut state = self.state.lock().await;
                        let order = &mut find_order_mut(&mut state, order_id)?.order;
                        if let Err(error) =
                            order.mark_submitted(broker_order_id.clone(), Timestamp::now())
                        {
                            tracing::warn!(order_id = %order_id, error = %error, "Acknowledgement for finished order");
                        }
                        self.audit.emit(AuditRecord::order(order));
                        (order.status(), order.cancel_requested())
                    };
                    tracing::info!(
                        order_id = %order_id,
                        broker_order_id = %broker_order_id,
                        attempts,
                        "Order submitted"
                    );
                    observability::record_order_submission(
                        "submitted",
                        attempts,
                        started.elapsed().as_secs_f64(),
                    );
                    if cancel_now {
                        // Cancelled locally while the submit was in flight.
                        self.cancel_at_broker(order_id, &broker_order_id).await;
                    }
                    return Ok(status);
                }
                Err(error) if error.is_retryable() => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            order_id = %order_id,
                            attempt = attempts,
                            error = %error,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Submission failed, retrying"
                        );
                        observability::record_order_retry(error.label());
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let reason = format!("retries exhausted after {attempts} attempts: {error}");
                    observability::record_order_submission(
                        "exhausted",
                        attempts,
                        started.elapsed().as_secs_f64(),
                    );
                    return self.fail_order(order_id, reason, true).await;
                }
                Err(error) => {
                    observability::record_order_submission(
                        "rejected",
                        attempts,
                        started.elapsed().as_secs_f64(),
                    );
                    return self.fail_order(order_id, error.to_string(), false).await;
                }
            }
        }
    }

    /// One leg of a multi-leg entry failed: withdraw the legs not yet sent,
    /// cancel the ones working and alert if any leg already filled.
    async fn abort_siblings(
        &self,
        signal: &TradeSignal,
        failed: &OrderId,
        sent: &[OrderId],
        unsent: &[OrderId],
    ) {
        if sent.is_empty() && unsent.is_empty() {
            return;
        }
        tracing::warn!(
            signal_id = %signal.id,
            order_id = %failed,
            "Entry leg failed, withdrawing remaining legs"
        );
        for id in unsent.iter().chain(sent) {
            if let Err(error) = self.cancel(id).await {
                tracing::warn!(order_id = %id, error = %error, "Leg cancel failed");
            }
        }

        let state = self.state.lock().await;
        let filled: Vec<_> = sent
            .iter()
            .filter_map(|id| state.orders.get(id))
            .filter(|t| t.order.cum_qty() > 0)
            .map(|t| t.order.contract().clone())
            .collect();
        drop(state);
        for contract in filled {
            let message = format!("signal {} left with an unhedged leg on {contract}", signal.id);
            tracing::error!(signal_id = %signal.id, contract = %contract, "Multi-leg entry incomplete");
            self.audit.emit(AuditRecord::Alert {
                message,
                order_id: Some(failed.clone()),
                contract: Some(contract),
            });
        }
    }

    async fn fail_order(
        &self,
        order_id: &OrderId,
        reason: String,
        alert: bool,
    ) -> Result<OrderStatus, EngineError> {
        let now = Timestamp::now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let order = &mut find_order_mut(state, order_id)?.order;
        if let Err(error) = order.reject(reason.clone(), now) {
            tracing::warn!(order_id = %order_id, error = %error, "Order advanced before rejection");
            let status = order.status();
            self.settle_order(state, order_id, now);
            return Ok(status);
        }
        let status = order.status();
        let contract = order.contract().clone();
        self.audit.emit(AuditRecord::order(order));

        if alert {
            tracing::error!(order_id = %order_id, contract = %contract, reason = %reason, "Order abandoned");
            self.audit.emit(AuditRecord::Alert {
                message: reason,
                order_id: Some(order_id.clone()),
                contract: Some(contract),
            });
        } else {
            tracing::warn!(order_id = %order_id, reason = %reason, "Order rejected by broker");
        }
        self.settle_order(state, order_id, now);
        Ok(status)
    }

    /// Check exits for every marked instrument and submit closing orders.
    /// Working entry orders on an exiting instrument are cancelled after the
    /// exit is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a closing order cannot be built.
    pub async fn process_exits(
        &self,
        marks: &[(OptionContract, Decimal)],
        now: Timestamp,
    ) -> Result<Vec<OrderId>, EngineError> {
        let (exit_ids, cancels) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let triggers: Vec<_> = marks
                .iter()
                .flat_map(|(contract, mark)| {
                    state
                        .ledger
                        .check_exits(contract, *mark, now, self.config.time_stop_dte)
                })
                .collect();

            let mut exit_ids = Vec::with_capacity(triggers.len());
            let mut cancels: Vec<OrderId> = Vec::new();
            for trigger in triggers {
                let quantity = state.ledger.begin_exit(&trigger.position_id)?;
                let signal_id = state
                    .ledger
                    .position(&trigger.position_id)
                    .map(|p| p.signal_id().clone());
                let order = Order::new(
                    trigger.contract.clone(),
                    trigger.side,
                    trigger.reason.purpose(),
                    quantity,
                    trigger.mark.max(MIN_TICK),
                    signal_id,
                    now,
                )?;
                tracing::info!(
                    position_id = %trigger.position_id,
                    contract = %trigger.contract,
                    reason = ?trigger.reason,
                    mark = %trigger.mark,
                    quantity,
                    "Exit triggered"
                );
                self.audit.emit(AuditRecord::order(&order));
                exit_ids.push(order.id().clone());
                state.orders.insert(
                    order.id().clone(),
                    TrackedOrder {
                        order,
                        position_id: trigger.position_id,
                    },
                );

                for t in state.orders.values() {
                    let o = &t.order;
                    if o.contract() == &trigger.contract
                        && o.purpose().is_entry()
                        && o.status().is_active()
                        && !cancels.contains(o.id())
                    {
                        cancels.push(o.id().clone());
                    }
                }
            }
            (exit_ids, cancels)
        };

        for id in &exit_ids {
            if let Err(error) = self.submit_with_retry(id).await {
                tracing::error!(order_id = %id, error = %error, "Exit submission failed");
            }
        }
        for id in &cancels {
            if let Err(error) = self.cancel(id).await {
                tracing::warn!(order_id = %id, error = %error, "Entry cancel failed");
            }
        }
        Ok(exit_ids)
    }

    /// Cancel an order. An order not yet acknowledged is cancelled locally;
    /// otherwise the broker is asked, and a fill that lands first wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown or the broker call fails.
    pub async fn cancel(&self, order_id: &OrderId) -> Result<OrderStatus, EngineError> {
        let broker_order_id = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let order = &mut find_order_mut(state, order_id)?.order;
            if order.status().is_terminal() {
                return Ok(order.status());
            }
            order.request_cancel();
            if let Some(id) = order.broker_order_id() {
                id.clone()
            } else {
                let now = Timestamp::now();
                order.mark_cancelled(now)?;
                self.audit.emit(AuditRecord::order(order));
                self.settle_order(state, order_id, now);
                return Ok(OrderStatus::Cancelled);
            }
        };

        let timeout = Duration::from_millis(self.config.cancel_timeout_ms);
        let result = tokio::time::timeout(timeout, self.broker.cancel_order(&broker_order_id))
            .await
            .unwrap_or(Err(BrokerError::Timeout {
                elapsed_ms: self.config.cancel_timeout_ms,
            }));

        let now = Timestamp::now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let order = &mut find_order_mut(state, order_id)?.order;
        if let Err(error) = result {
            tracing::warn!(order_id = %order_id, error = %error, "Cancel failed");
            return Err(error.into());
        }
        if order.status().is_active() {
            order.mark_cancelled(now)?;
            self.audit.emit(AuditRecord::order(order));
        }
        let status = order.status();
        self.settle_order(state, order_id, now);
        tracing::info!(order_id = %order_id, status = %status, "Cancel processed");
        Ok(status)
    }

    async fn cancel_at_broker(&self, order_id: &OrderId, broker_order_id: &BrokerOrderId) {
        let timeout = Duration::from_millis(self.config.cancel_timeout_ms);
        match tokio::time::timeout(timeout, self.broker.cancel_order(broker_order_id)).await {
            Ok(Ok(())) => tracing::info!(order_id = %order_id, "Late acknowledgement cancelled"),
            Ok(Err(error)) => {
                tracing::warn!(order_id = %order_id, error = %error, "Late acknowledgement cancel failed");
            }
            Err(_) => tracing::warn!(order_id = %order_id, "Late acknowledgement cancel timed out"),
        }
    }

    /// Reconcile one broker fill into its order and position.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown order, a fill larger than the order's
    /// remaining quantity, or a ledger invariant violation (which also halts
    /// the instrument).
    pub async fn handle_fill(&self, fill: FillNotification) -> Result<FillOutcome, EngineError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let tracked = find_order_mut(state, &fill.order_id)?;
        let before = tracked.order.clone();
        let outcome = tracked.order.apply_fill(&fill)?;
        let purpose = tracked.order.purpose().to_string();
        let contract = tracked.order.contract().clone();
        let ledger_fill = LedgerFill {
            fill_id: fill.fill_id.clone(),
            position_id: tracked.position_id.clone(),
            side: tracked.order.side(),
            purpose: tracked.order.purpose(),
            quantity: fill.quantity,
            price: fill.price,
            timestamp: fill.timestamp,
        };

        if outcome == FillOutcome::Duplicate {
            tracing::debug!(fill_id = %fill.fill_id, order_id = %fill.order_id, "Duplicate fill ignored");
            observability::record_fill(&purpose, "duplicate");
            return Ok(outcome);
        }

        match state.ledger.apply_fill(&ledger_fill) {
            Ok(LedgerOutcome::Applied { position, realized }) => {
                if !realized.is_zero() {
                    state.capital.realize(realized);
                }
                self.audit.emit(AuditRecord::ledger(&position));
            }
            Ok(LedgerOutcome::Duplicate) => {}
            Err(error) => {
                // The order must not remember a fill the book refused, so a
                // redelivery after the halt is cleared is booked.
                if let Some(t) = state.orders.get_mut(&fill.order_id) {
                    t.order = before;
                }
                observability::record_fill(&purpose, "violation");
                self.audit.emit(AuditRecord::Alert {
                    message: error.to_string(),
                    order_id: Some(fill.order_id.clone()),
                    contract: Some(contract),
                });
                return Err(error.into());
            }
        }

        if let Some(t) = state.orders.get(&fill.order_id) {
            self.audit.emit(AuditRecord::order(&t.order));
        }
        let label = if matches!(outcome, FillOutcome::Late { .. }) {
            tracing::warn!(fill_id = %fill.fill_id, order_id = %fill.order_id, "Late fill booked");
            "late"
        } else {
            "applied"
        };
        observability::record_fill(&purpose, label);
        self.settle_order(state, &fill.order_id, fill.timestamp);
        observability::update_open_positions(state.ledger.open_positions().count());
        Ok(outcome)
    }

    /// Spawn the task that drains fill notifications.
    pub fn spawn_reconciler(
        self: &Arc<Self>,
        mut fills: mpsc::Receiver<FillNotification>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(fill) = fills.recv().await {
                let fill_id = fill.fill_id.clone();
                if let Err(error) = this.handle_fill(fill).await {
                    tracing::error!(
                        fill_id = %fill_id,
                        code = %error.code(),
                        error = %error,
                        "Fill reconciliation failed"
                    );
                }
            }
            tracing::info!("Fill channel closed, reconciler stopping");
        })
    }

    /// Copy of an order.
    pub async fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.state
            .lock()
            .await
            .orders
            .get(order_id)
            .map(|t| t.order.clone())
    }

    /// Copies of all orders.
    pub async fn orders(&self) -> Vec<Order> {
        self.state
            .lock()
            .await
            .orders
            .values()
            .map(|t| t.order.clone())
            .collect()
    }

    /// Operator action: lift the halt on an instrument after a ledger
    /// invariant violation has been investigated.
    pub async fn clear_halt(&self, contract: &OptionContract) -> bool {
        self.state.lock().await.ledger.clear_halt(contract)
    }

    /// Consistent copy of the ledger.
    pub async fn ledger_snapshot(&self) -> LedgerSnapshot {
        self.state.lock().await.ledger.snapshot()
    }

    /// Follow-up once an order may have reached a terminal status.
    fn settle_order(&self, state: &mut TradingState, order_id: &OrderId, now: Timestamp) {
        let Some(tracked) = state.orders.get(order_id) else {
            return;
        };
        if !tracked.order.status().is_terminal() {
            return;
        }
        let position_id = tracked.position_id.clone();
        let signal_id = tracked.order.signal_id().cloned();
        let filled = tracked.order.cum_qty();
        let is_entry = tracked.order.purpose().is_entry();
        let position_status = state.ledger.position(&position_id).map(|p| p.status());

        if is_entry {
            if filled == 0
                && position_status == Some(PositionStatus::Pending)
                && let Err(error) = state.ledger.abandon_pending(&position_id, now)
            {
                tracing::warn!(position_id = %position_id, error = %error, "Could not abandon position");
            }
            if let Some(signal_id) = signal_id {
                state.settle_entries(&signal_id);
            }
        } else if position_status == Some(PositionStatus::Open) {
            state.ledger.cancel_exit(&position_id);
            tracing::info!(position_id = %position_id, "Exit order ended with position open");
        }
        if let Some(position) = state.ledger.position(&position_id) {
            self.audit.emit(AuditRecord::ledger(position));
        }
        state.retire_order(order_id, self.config.finished_order_retention);
    }
}

fn find_order<'a>(state: &'a TradingState, order_id: &OrderId) -> Result<&'a TrackedOrder, OrderError> {
    state.orders.get(order_id).ok_or_else(|| OrderError::NotFound {
        order_id: order_id.clone(),
    })
}

fn find_order_mut<'a>(
    state: &'a mut TradingState,
    order_id: &OrderId,
) -> Result<&'a mut TrackedOrder, OrderError> {
    state.orders.get_mut(order_id).ok_or_else(|| OrderError::NotFound {
        order_id: order_id.clone(),
    })
}
