//! Risk manager: ordered constraint checks, sizing and exit levels.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use super::decision::{ApprovedTrade, RiskConstraint, RiskDecision};
use super::portfolio::PortfolioSnapshot;
use crate::config::RiskConfig;
use crate::domain::order::OrderSide;
use crate::domain::signal::TradeSignal;

/// Stateless evaluator of trade signals against a portfolio snapshot.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    /// Create a risk manager.
    #[must_use]
    pub const fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Capital needed for one unit of the signal's structure.
    #[must_use]
    pub fn unit_cost(&self, signal: &TradeSignal) -> Decimal {
        signal.entry_price() * self.config.contract_multiplier
    }

    /// Evaluate `signal`. Checks run in order and stop at the first failure:
    /// capital, underlying exposure, portfolio exposure, drawdown, then the
    /// capital-preservation floor. Surviving signals are sized.
    #[must_use]
    pub fn evaluate(
        &self,
        signal: &TradeSignal,
        portfolio: &PortfolioSnapshot,
        realized_vol: Option<f64>,
    ) -> RiskDecision {
        let id = &signal.id;
        let cfg = &self.config;
        let entry = signal.entry_price();
        if signal.legs.is_empty() || entry <= Decimal::ZERO {
            return RiskDecision::reject(
                id,
                RiskConstraint::InvalidSignal,
                format!("entry price {entry} with {} legs", signal.legs.len()),
            );
        }
        let unit_cost = self.unit_cost(signal);

        if portfolio.available_capital < unit_cost {
            return RiskDecision::reject(
                id,
                RiskConstraint::InsufficientCapital,
                format!(
                    "insufficient capital: requires {unit_cost}, available {}",
                    portfolio.available_capital
                ),
            );
        }

        let underlying_limit = portfolio.equity * cfg.max_underlying_exposure;
        let underlying_headroom = underlying_limit - portfolio.exposure_for(&signal.underlying);
        if underlying_headroom < unit_cost {
            return RiskDecision::reject(
                id,
                RiskConstraint::UnderlyingExposure,
                format!(
                    "{} exposure {} leaves {underlying_headroom} of limit {underlying_limit}, unit cost {unit_cost}",
                    signal.underlying,
                    portfolio.exposure_for(&signal.underlying)
                ),
            );
        }

        let portfolio_limit = portfolio.equity * cfg.max_portfolio_exposure;
        let portfolio_headroom = portfolio_limit - portfolio.total_exposure();
        if portfolio_headroom < unit_cost {
            return RiskDecision::reject(
                id,
                RiskConstraint::PortfolioExposure,
                format!(
                    "portfolio exposure {} leaves {portfolio_headroom} of limit {portfolio_limit}, unit cost {unit_cost}",
                    portfolio.total_exposure()
                ),
            );
        }

        let drawdown = portfolio.drawdown();
        if drawdown >= cfg.max_drawdown {
            return RiskDecision::reject(
                id,
                RiskConstraint::DrawdownCeiling,
                format!("drawdown {drawdown} at or beyond ceiling {}", cfg.max_drawdown),
            );
        }
        let floor = portfolio.initial_equity * cfg.capital_preservation_floor;
        if portfolio.equity < floor {
            return RiskDecision::reject(
                id,
                RiskConstraint::CapitalPreservation,
                format!("equity {} below preservation floor {floor}", portfolio.equity),
            );
        }

        let budget = cfg.sizing.budget(portfolio.equity, realized_vol);
        let units = |amount: Decimal| (amount / unit_cost).floor().to_u32().unwrap_or(u32::MAX);
        let quantity = units(budget)
            .min(units(underlying_headroom))
            .min(units(portfolio_headroom))
            .min(units(portfolio.available_capital))
            .min(cfg.max_contracts);
        if quantity == 0 {
            return RiskDecision::reject(
                id,
                RiskConstraint::SizingBudget,
                format!("budget {budget} below unit cost {unit_cost}"),
            );
        }

        let (stop_loss, take_profit) = exit_levels(
            signal.side(),
            entry,
            cfg.stop_loss_pct,
            cfg.take_profit_pct,
        );
        let notional = Decimal::from(quantity) * unit_cost;

        RiskDecision::Approved(ApprovedTrade {
            signal_id: id.clone(),
            underlying: signal.underlying.clone(),
            quantity,
            entry_price: entry,
            stop_loss,
            take_profit,
            max_loss: notional * cfg.stop_loss_pct,
            notional,
        })
    }
}

/// Stop-loss and take-profit premium levels for a position opened on `side`
/// at `entry`. Long premium stops below entry; short premium stops above.
#[must_use]
pub fn exit_levels(
    side: OrderSide,
    entry: Decimal,
    stop_loss_pct: Decimal,
    take_profit_pct: Option<Decimal>,
) -> (Decimal, Option<Decimal>) {
    match side {
        OrderSide::Buy => (
            entry * (Decimal::ONE - stop_loss_pct),
            take_profit_pct.map(|tp| entry * (Decimal::ONE + tp)),
        ),
        OrderSide::Sell => (
            entry * (Decimal::ONE + stop_loss_pct),
            take_profit_pct.map(|tp| (entry * (Decimal::ONE - tp)).max(Decimal::ZERO)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::anomaly::Direction;
    use crate::domain::shared::{OptionContract, OptionKind};
    use crate::domain::signal::SignalLeg;
    use crate::testing::as_of;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn signal(side: OrderSide, bid: Decimal, ask: Decimal) -> TradeSignal {
        let leg = SignalLeg {
            contract: OptionContract::new(
                "SPY".into(),
                dec!(100),
                as_of().plus(Duration::days(30)),
                OptionKind::Call,
            ),
            side,
            bid,
            ask,
        };
        let direction = match side {
            OrderSide::Buy => Direction::Bullish,
            OrderSide::Sell => Direction::ShortVolatility,
        };
        TradeSignal::new(
            "SPY".into(),
            direction,
            vec![leg],
            0.5,
            Vec::new(),
            as_of(),
            as_of().plus(Duration::seconds(60)),
        )
    }

    fn portfolio(equity: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot {
            equity,
            peak_equity: equity,
            initial_equity: equity,
            available_capital: equity,
            underlying_exposure: HashMap::new(),
        }
    }

    #[test]
    fn insufficient_capital_rejects_with_zero_size() {
        let manager = RiskManager::new(RiskConfig::default());
        let decision = manager.evaluate(
            &signal(OrderSide::Buy, dec!(149), dec!(150)),
            &portfolio(dec!(10000)),
            None,
        );

        assert_eq!(decision.size(), 0);
        assert_eq!(decision.constraint(), Some(RiskConstraint::InsufficientCapital));
        let RiskDecision::Rejected(rejection) = decision else {
            panic!("expected rejection");
        };
        assert!(rejection.reason.contains("insufficient capital"));
    }

    #[test]
    fn sizes_by_budget_and_sets_long_levels() {
        let manager = RiskManager::new(RiskConfig::default());
        let decision = manager.evaluate(
            &signal(OrderSide::Buy, dec!(1.90), dec!(2.00)),
            &portfolio(dec!(100000)),
            None,
        );

        let RiskDecision::Approved(trade) = decision else {
            panic!("expected approval");
        };
        // 2% of 100k = 2000 budget, 200 per contract.
        assert_eq!(trade.quantity, 10);
        assert_eq!(trade.entry_price, dec!(2.00));
        assert_eq!(trade.stop_loss, dec!(1.00));
        assert_eq!(trade.take_profit, Some(dec!(4.00)));
        assert_eq!(trade.notional, dec!(2000));
        assert_eq!(trade.max_loss, dec!(1000));
    }

    #[test]
    fn short_levels_are_inverted() {
        let (stop, tp) = exit_levels(OrderSide::Sell, dec!(4), dec!(0.5), Some(dec!(0.75)));
        assert_eq!(stop, dec!(6));
        assert_eq!(tp, Some(dec!(1)));
        let manager = RiskManager::new(RiskConfig::default());
        let decision = manager.evaluate(
            &signal(OrderSide::Sell, dec!(4.00), dec!(4.20)),
            &portfolio(dec!(100000)),
            None,
        );
        let RiskDecision::Approved(trade) = decision else {
            panic!("expected approval");
        };
        assert_eq!(trade.entry_price, dec!(4.00));
        assert_eq!(trade.stop_loss, dec!(6.00));
    }

    #[test]
    fn underlying_cap_checked_before_portfolio_cap() {
        let manager = RiskManager::new(RiskConfig::default());
        let mut snap = portfolio(dec!(100000));
        snap.underlying_exposure.insert("SPY".into(), dec!(24900));
        snap.underlying_exposure.insert("QQQ".into(), dec!(40000));
        snap.available_capital = dec!(35100);
        let decision = manager.evaluate(&signal(OrderSide::Buy, dec!(1.9), dec!(2)), &snap, None);
        assert_eq!(decision.constraint(), Some(RiskConstraint::UnderlyingExposure));

        snap.underlying_exposure.insert("SPY".into(), dec!(10000));
        snap.underlying_exposure.insert("QQQ".into(), dec!(49900));
        let decision = manager.evaluate(&signal(OrderSide::Buy, dec!(1.9), dec!(2)), &snap, None);
        assert_eq!(decision.constraint(), Some(RiskConstraint::PortfolioExposure));
    }

    #[test]
    fn headroom_limits_quantity() {
        let manager = RiskManager::new(RiskConfig::default());
        let mut snap = portfolio(dec!(100000));
        snap.underlying_exposure.insert("SPY".into(), dec!(24500));
        snap.available_capital = dec!(75500);
        let decision = manager.evaluate(&signal(OrderSide::Buy, dec!(1.9), dec!(2)), &snap, None);
        assert_eq!(decision.size(), 2);
    }

    #[test]
    fn drawdown_and_floor_halt_trading() {
        let manager = RiskManager::new(RiskConfig::default());
        let mut snap = portfolio(dec!(75000));
        snap.peak_equity = dec!(100000);
        snap.initial_equity = dec!(100000);
        let decision = manager.evaluate(&signal(OrderSide::Buy, dec!(1.9), dec!(2)), &snap, None);
        assert_eq!(decision.constraint(), Some(RiskConstraint::DrawdownCeiling));

        let mut snap = portfolio(dec!(45000));
        snap.initial_equity = dec!(100000);
        let decision = manager.evaluate(&signal(OrderSide::Buy, dec!(1.9), dec!(2)), &snap, None);
        assert_eq!(decision.constraint(), Some(RiskConstraint::CapitalPreservation));
    }

    #[test]
    fn tiny_budget_rejects_sizing() {
        let manager = RiskManager::new(RiskConfig::default());
        // 2% of 20k = 400 budget; one unit costs 500.
        let decision = manager.evaluate(
            &signal(OrderSide::Buy, dec!(4.9), dec!(5)),
            &portfolio(dec!(20000)),
            None,
        );
        assert_eq!(decision.constraint(), Some(RiskConstraint::SizingBudget));
        assert_eq!(decision.size(), 0);
    }

    #[test]
    fn empty_signal_is_invalid() {
        let manager = RiskManager::new(RiskConfig::default());
        let mut s = signal(OrderSide::Buy, dec!(1), dec!(2));
        s.legs.clear();
        s.entry_band.high = Decimal::ZERO;
        let decision = manager.evaluate(&s, &portfolio(dec!(100000)), None);
        assert_eq!(decision.constraint(), Some(RiskConstraint::InvalidSignal));
    }
}
