//! Signal generator: correlates anomalies into trade signals per underlying.

use std::collections::{BTreeMap, HashMap};

use chrono::Duration;

use super::errors::SignalError;
use super::rules::RuleTable;
use super::state::SignalState;
use super::trade_signal::{TradeSignal, select_legs};
use crate::config::SignalConfig;
use crate::domain::anomaly::{AnomalySignal, Direction, VolatilityContext};
use crate::domain::shared::{SignalId, Timestamp, UnderlyingId};
use crate::domain::surface::VolatilitySurface;
use crate::observability;

#[derive(Debug, Default)]
struct UnderlyingBook {
    evaluating: bool,
    pending: Vec<AnomalySignal>,
    outstanding: Option<TradeSignal>,
}

/// Turns anomalies into at most one outstanding proposal per underlying.
#[derive(Debug)]
pub struct SignalGenerator {
    config: SignalConfig,
    rules: RuleTable,
    books: HashMap<UnderlyingId, UnderlyingBook>,
}

impl SignalGenerator {
    /// Create a generator.
    #[must_use]
    pub fn new(config: SignalConfig) -> Self {
        let rules = RuleTable::new(config.weights.clone(), config.confidence_scale)
            .with_context_weight(config.context_weight);
        Self {
            config,
            rules,
            books: HashMap::new(),
        }
    }

    /// Rule table in use.
    #[must_use]
    pub const fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// `Idle` or `Evaluating` for the underlying.
    #[must_use]
    pub fn phase(&self, underlying: &UnderlyingId) -> SignalState {
        match self.books.get(underlying) {
            Some(book) if book.evaluating => SignalState::Evaluating,
            _ => SignalState::Idle,
        }
    }

    /// Proposal awaiting a risk decision, if any.
    #[must_use]
    pub fn outstanding(&self, underlying: &UnderlyingId) -> Option<&TradeSignal> {
        self.books.get(underlying)?.outstanding.as_ref()
    }

    /// Anomalies waiting in the correlation window.
    #[must_use]
    pub fn pending(&self, underlying: &UnderlyingId) -> usize {
        self.books.get(underlying).map_or(0, |b| b.pending.len())
    }

    /// Feed this tick's anomalies for the surface's underlying, without
    /// premium context.
    pub fn evaluate(
        &mut self,
        anomalies: &[AnomalySignal],
        surface: &VolatilitySurface,
        now: Timestamp,
    ) -> Vec<TradeSignal> {
        self.evaluate_with_context(anomalies, surface, &VolatilityContext::default(), now)
    }

    /// Feed this tick's anomalies for the surface's underlying. Candidate
    /// confidence is shifted by the premium `context`.
    ///
    /// Returns every signal whose state changed: expired or superseded
    /// proposals and the new `Proposed` winner.
    pub fn evaluate_with_context(
        &mut self,
        anomalies: &[AnomalySignal],
        surface: &VolatilitySurface,
        context: &VolatilityContext,
        now: Timestamp,
    ) -> Vec<TradeSignal> {
        let underlying = surface.underlying().clone();
        let window = Duration::seconds(i64::try_from(self.config.correlation_window_secs).unwrap_or(i64::MAX));
        let ttl = Duration::seconds(i64::try_from(self.config.signal_ttl_secs).unwrap_or(i64::MAX));

        let book = self.books.entry(underlying.clone()).or_default();
        let mut changed = Vec::new();

        if let Some(expired) = expire_outstanding(book, now) {
            changed.push(expired);
        }

        book.pending.extend(
            anomalies
                .iter()
                .filter(|a| a.underlying == underlying)
                .cloned(),
        );
        book.pending
            .retain(|a| now.duration_since(a.timestamp) <= window);

        if book.pending.is_empty() {
            if book.evaluating {
                tracing::debug!(underlying = %underlying, "Correlation window drained");
                observability::record_signal_transition(SignalState::Evaluating, SignalState::Idle);
            }
            book.evaluating = false;
            return changed;
        }
        if !book.evaluating {
            observability::record_signal_transition(SignalState::Idle, SignalState::Evaluating);
        }
        book.evaluating = true;

        let mut by_direction: BTreeMap<Direction, Vec<AnomalySignal>> = BTreeMap::new();
        for anomaly in &book.pending {
            by_direction
                .entry(anomaly.direction)
                .or_default()
                .push(anomaly.clone());
        }

        let mut candidates = Vec::new();
        for (direction, group) in by_direction {
            let strong = group
                .iter()
                .any(|a| a.magnitude.abs() >= self.config.strong_magnitude);
            if group.len() < self.config.min_corroboration && !strong {
                continue;
            }
            let confidence =
                self.rules
                    .adjust(self.rules.confidence(&group), direction, context);
            if confidence < self.config.min_confidence {
                tracing::debug!(
                    underlying = %underlying,
                    direction = %direction,
                    confidence,
                    buyer_score = context.buyer_score(),
                    "Candidate below minimum confidence"
                );
                continue;
            }
            match select_legs(surface, direction, self.config.target_dte) {
                Ok(legs) => candidates.push(TradeSignal::new(
                    underlying.clone(),
                    direction,
                    legs,
                    confidence,
                    group,
                    now,
                    now.plus(ttl),
                )),
                Err(e) => {
                    tracing::warn!(underlying = %underlying, error = %e, "No instrument for candidate");
                }
            }
        }

        if candidates.is_empty() {
            return changed;
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut candidates = candidates.into_iter();
        let Some(mut winner) = candidates.next() else {
            return changed;
        };
        for mut loser in candidates {
            if supersede(&mut loser) {
                changed.push(loser);
            }
        }

        book.pending.clear();
        book.evaluating = false;
        observability::record_signal_transition(SignalState::Evaluating, SignalState::Idle);

        if let Some(current) = book.outstanding.as_mut() {
            if winner.confidence <= current.confidence {
                tracing::info!(
                    underlying = %underlying,
                    outstanding = %current.id,
                    confidence = winner.confidence,
                    "Candidate does not beat outstanding proposal"
                );
                if supersede(&mut winner) {
                    changed.push(winner);
                }
                return changed;
            }
            if let Some(mut replaced) = book.outstanding.take()
                && supersede(&mut replaced)
            {
                changed.push(replaced);
            }
        }

        if let Err(e) = winner.transition(SignalState::Proposed) {
            tracing::error!(error = %e, "Failed to propose signal");
            return changed;
        }
        observability::record_signal_transition(SignalState::Evaluating, SignalState::Proposed);
        tracing::info!(
            underlying = %underlying,
            signal_id = %winner.id,
            direction = %winner.direction,
            confidence = winner.confidence,
            legs = winner.legs.len(),
            "Trade signal proposed"
        );
        book.outstanding = Some(winner.clone());
        changed.push(winner);
        changed
    }

    /// Record the risk outcome for a proposal. A decision arriving at or after
    /// the deadline expires the signal instead.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSignal` if no outstanding proposal has this id.
    pub fn record_decision(
        &mut self,
        signal_id: &SignalId,
        approved: bool,
        now: Timestamp,
    ) -> Result<TradeSignal, SignalError> {
        let mut signal = self
            .books
            .values_mut()
            .find_map(|book| {
                if book.outstanding.as_ref().is_some_and(|s| &s.id == signal_id) {
                    book.outstanding.take()
                } else {
                    None
                }
            })
            .ok_or_else(|| SignalError::UnknownSignal {
                signal_id: signal_id.clone(),
            })?;

        let to = if signal.is_expired(now) {
            SignalState::Expired
        } else if approved {
            SignalState::Approved
        } else {
            SignalState::Rejected
        };
        signal.transition(to)?;
        observability::record_signal_transition(SignalState::Proposed, to);
        tracing::info!(signal_id = %signal.id, state = %to, "Signal decided");
        Ok(signal)
    }

    /// Expire every proposal past its deadline.
    pub fn expire_stale(&mut self, now: Timestamp) -> Vec<TradeSignal> {
        self.books
            .values_mut()
            .filter_map(|book| expire_outstanding(book, now))
            .collect()
    }

    /// Forget all state for `underlying`.
    pub fn reset(&mut self, underlying: &UnderlyingId) {
        self.books.remove(underlying);
    }
}

fn expire_outstanding(book: &mut UnderlyingBook, now: Timestamp) -> Option<TradeSignal> {
    if !book.outstanding.as_ref().is_some_and(|s| s.is_expired(now)) {
        return None;
    }
    let mut signal = book.outstanding.take()?;
    signal.transition(SignalState::Expired).ok()?;
    observability::record_signal_transition(SignalState::Proposed, SignalState::Expired);
    tracing::info!(signal_id = %signal.id, "Signal expired without decision");
    Some(signal)
}

fn supersede(signal: &mut TradeSignal) -> bool {
    let from = signal.state();
    match signal.transition(SignalState::Superseded) {
        Ok(()) => {
            observability::record_signal_transition(from, SignalState::Superseded);
            tracing::debug!(signal_id = %signal.id, confidence = signal.confidence, "Signal superseded");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to supersede signal");
            false
        }
    }
}
