//! Tick driver.
//!
//! Each tick fetches quotes for every configured underlying and runs that
//! underlying's chain as its own task: surface, exit monitor, anomaly
//! detection, signal generation, risk and execution. Exits for an
//! underlying are always processed before its new entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;

use super::execution::ExecutionCoordinator;
use super::risk_gate::RiskGate;
use super::state::{SharedState, TradingState};
use crate::application::ports::{AuditRecord, AuditTrail, BrokerPort, QuoteSource, QuoteSourceError};
use crate::config::Config;
use crate::domain::anomaly::AnomalyDetector;
use crate::domain::risk::{RealizedVolatility, RiskDecision, RiskManager};
use crate::domain::shared::{OptionContract, Timestamp, UnderlyingId};
use crate::domain::signal::{SignalGenerator, SignalState};
use crate::domain::surface::{MarketContext, VolatilitySurfaceEngine};
use crate::error::EngineError;
use crate::observability;

/// Outcome for one underlying in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnderlyingReport {
    /// Underlying processed.
    pub underlying: UnderlyingId,
    /// Points on the surface.
    pub surface_points: usize,
    /// Quotes excluded from the surface.
    pub excluded_quotes: usize,
    /// Anomalies detected this tick.
    pub anomalies: usize,
    /// Exit orders issued.
    pub exits: usize,
    /// Proposals sent to risk.
    pub proposals: usize,
    /// Proposals approved and executed.
    pub executed: usize,
    /// Entry orders created.
    pub entry_orders: usize,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Underlyings that ran, sorted by id.
    pub processed: Vec<UnderlyingReport>,
    /// Underlyings skipped with the reason.
    pub skipped: Vec<(UnderlyingId, String)>,
}

impl TickReport {
    /// Report for one underlying.
    #[must_use]
    pub fn underlying(&self, underlying: &UnderlyingId) -> Option<&UnderlyingReport> {
        self.processed.iter().find(|r| &r.underlying == underlying)
    }
}

#[derive(Debug)]
struct UnderlyingWorker {
    detector: AnomalyDetector,
    generator: SignalGenerator,
    realized_vol: RealizedVolatility,
}

/// Periodic driver over all configured underlyings.
pub struct TradingPipeline {
    engine: VolatilitySurfaceEngine,
    quotes: Arc<dyn QuoteSource>,
    risk_gate: Arc<RiskGate>,
    coordinator: Arc<ExecutionCoordinator>,
    audit: Arc<AuditTrail>,
    workers: HashMap<UnderlyingId, Arc<Mutex<UnderlyingWorker>>>,
    tick_interval: Duration,
    quote_timeout: Duration,
}

impl std::fmt::Debug for TradingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingPipeline")
            .field("underlyings", &self.workers.keys().collect::<Vec<_>>())
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl TradingPipeline {
    /// Wire the pipeline from configuration and adapters.
    #[must_use]
    pub fn new(
        config: &Config,
        quotes: Arc<dyn QuoteSource>,
        broker: Arc<dyn BrokerPort>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        let state: SharedState =
            TradingState::new(config.risk.initial_capital, config.risk.contract_multiplier)
                .shared();
        let risk_gate = Arc::new(RiskGate::new(
            RiskManager::new(config.risk.clone()),
            Arc::clone(&state),
            Arc::clone(&audit),
        ));
        let coordinator = Arc::new(ExecutionCoordinator::new(
            broker,
            state,
            Arc::clone(&audit),
            config.execution.clone(),
            &config.risk,
        ));

        let workers = config
            .pipeline
            .underlyings
            .iter()
            .map(|name| {
                let underlying = UnderlyingId::new(name.as_str());
                let worker = UnderlyingWorker {
                    detector: AnomalyDetector::new(underlying.clone(), config.anomaly.clone()),
                    generator: SignalGenerator::new(config.signals.clone()),
                    realized_vol: RealizedVolatility::new(
                        config.risk.realized_vol_window,
                        config.risk.periods_per_year,
                    ),
                };
                (underlying, Arc::new(Mutex::new(worker)))
            })
            .collect();

        Self {
            engine: VolatilitySurfaceEngine::new(config.surface.clone()),
            quotes,
            risk_gate,
            coordinator,
            audit,
            workers,
            tick_interval: Duration::from_millis(config.pipeline.tick_interval_ms),
            quote_timeout: Duration::from_millis(config.pipeline.quote_timeout_ms),
        }
    }

    /// Execution coordinator, for wiring the fill reconciler.
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<ExecutionCoordinator> {
        &self.coordinator
    }

    /// Risk gate.
    #[must_use]
    pub const fn risk_gate(&self) -> &Arc<RiskGate> {
        &self.risk_gate
    }

    /// Shared trading state.
    #[must_use]
    pub fn state(&self) -> &SharedState {
        self.coordinator.state()
    }

    /// Clear the anomaly baseline and signal book of one underlying.
    pub async fn reset_underlying(&self, underlying: &UnderlyingId) -> bool {
        let Some(worker) = self.workers.get(underlying) else {
            return false;
        };
        let mut worker = worker.lock().await;
        worker.detector.reset();
        worker.generator.reset(underlying);
        tracing::info!(underlying = %underlying, "Underlying state reset");
        true
    }

    /// Run one tick at `now`. Underlyings run concurrently; a failure in one
    /// skips it without affecting the others.
    pub async fn tick(self: &Arc<Self>, now: Timestamp) -> TickReport {
        let started = Instant::now();
        let mut tasks = JoinSet::new();
        for (underlying, worker) in &self.workers {
            let this = Arc::clone(self);
            let underlying = underlying.clone();
            let worker = Arc::clone(worker);
            tasks.spawn(async move {
                let result = this.process_underlying(&underlying, &worker, now).await;
                (underlying, result)
            });
        }

        let mut report = TickReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(processed))) => report.processed.push(processed),
                Ok((underlying, Err(error))) => {
                    tracing::warn!(
                        underlying = %underlying,
                        code = %error.code(),
                        error = %error,
                        "Underlying skipped this tick"
                    );
                    report.skipped.push((underlying, error.to_string()));
                }
                Err(error) => tracing::error!(error = %error, "Underlying task failed"),
            }
        }
        report
            .processed
            .sort_by(|a, b| a.underlying.as_str().cmp(b.underlying.as_str()));
        report
            .skipped
            .sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        observability::record_tick(
            report.processed.len(),
            report.skipped.len(),
            started.elapsed().as_secs_f64(),
        );
        report
    }

    /// Tick on the configured interval until `shutdown` turns true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(
            underlyings = self.workers.len(),
            interval_ms = u64::try_from(self.tick_interval.as_millis()).unwrap_or(u64::MAX),
            "Pipeline started"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(Timestamp::now()).await;
                    tracing::debug!(
                        processed = report.processed.len(),
                        skipped = report.skipped.len(),
                        "Tick complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Pipeline stopped");
    }

    async fn process_underlying(
        &self,
        underlying: &UnderlyingId,
        worker: &Mutex<UnderlyingWorker>,
        now: Timestamp,
    ) -> Result<UnderlyingReport, EngineError> {
        let started = Instant::now();
        let mut worker = worker.lock().await;
        let worker = &mut *worker;

        for expired in worker.generator.expire_stale(now) {
            self.risk_gate.release(&expired.id).await;
            self.audit.emit(AuditRecord::signal(&expired));
        }

        let snapshot = tokio::time::timeout(self.quote_timeout, self.quotes.fetch(underlying))
            .await
            .map_err(|_| QuoteSourceError::Timeout {
                underlying: underlying.clone(),
                elapsed_ms: u64::try_from(self.quote_timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        let surface = self.engine.build(
            underlying,
            &snapshot.quotes,
            MarketContext {
                spot: snapshot.spot,
                rate: self.engine.config().risk_free_rate,
                dividend_yield: self.engine.config().dividend_yield,
                as_of: snapshot.as_of,
            },
        )?;
        worker.realized_vol.push(snapshot.spot);

        let mut report = UnderlyingReport {
            underlying: underlying.clone(),
            surface_points: surface.points().len(),
            excluded_quotes: surface.excluded().len(),
            anomalies: 0,
            exits: 0,
            proposals: 0,
            executed: 0,
            entry_orders: 0,
        };

        let marks: Vec<(OptionContract, Decimal)> = surface
            .points()
            .iter()
            .map(|p| (p.contract.clone(), p.mid))
            .collect();
        report.exits = self.coordinator.process_exits(&marks, now).await?.len();

        let anomalies = worker
            .detector
            .observe(&surface.metrics(self.engine.wings()), now);
        report.anomalies = anomalies.len();

        let realized_vol = worker.realized_vol.value();
        let context = worker.detector.context(realized_vol);
        if let Some(premium) = context.premium {
            tracing::debug!(underlying = %underlying, premium = ?premium, "IV against realized");
        }
        let changed = worker
            .generator
            .evaluate_with_context(&anomalies, &surface, &context, now);
        for signal in &changed {
            self.audit.emit(AuditRecord::signal(signal));
        }

        for proposal in changed
            .into_iter()
            .filter(|s| s.state() == SignalState::Proposed)
        {
            report.proposals += 1;
            let decision = self.risk_gate.evaluate(&proposal, realized_vol).await;
            let decided_at = now.plus(
                chrono::Duration::from_std(started.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero()),
            );
            let decided =
                worker
                    .generator
                    .record_decision(&proposal.id, decision.is_approved(), decided_at)?;
            self.audit.emit(AuditRecord::signal(&decided));

            match decision {
                RiskDecision::Approved(trade) if decided.state() == SignalState::Approved => {
                    let orders = self.coordinator.execute(&trade, &decided, now).await?;
                    report.entry_orders += orders.len();
                    if !orders.is_empty() {
                        report.executed += 1;
                    }
                }
                RiskDecision::Approved(_) => self.risk_gate.release(&decided.id).await,
                RiskDecision::Rejected(_) => {}
            }
        }

        tracing::debug!(
            underlying = %underlying,
            points = report.surface_points,
            anomalies = report.anomalies,
            exits = report.exits,
            proposals = report.proposals,
            "Underlying processed"
        );
        Ok(report)
    }
}
