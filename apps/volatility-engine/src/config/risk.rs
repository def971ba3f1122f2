//! Risk limits, sizing and stop configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::risk::SizingRule;

/// Capital, exposure and drawdown constraints plus sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Starting account equity.
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    /// Underlying units per option contract.
    #[serde(default = "default_contract_multiplier")]
    pub contract_multiplier: Decimal,
    /// Maximum exposure in one underlying as a fraction of equity.
    #[serde(default = "default_max_underlying_exposure")]
    pub max_underlying_exposure: Decimal,
    /// Maximum total exposure as a fraction of equity.
    #[serde(default = "default_max_portfolio_exposure")]
    pub max_portfolio_exposure: Decimal,
    /// Drawdown from peak equity at which new entries are refused.
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: Decimal,
    /// Fraction of initial capital below which all trading halts.
    #[serde(default = "default_capital_preservation_floor")]
    pub capital_preservation_floor: Decimal,
    /// Position sizing rule.
    #[serde(default)]
    pub sizing: SizingRule,
    /// Stop-loss as a fraction of entry premium.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// Take-profit as a fraction of entry premium; `None` disables it.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Option<Decimal>,
    /// Hard cap on contracts per signal.
    #[serde(default = "default_max_contracts")]
    pub max_contracts: u32,
    /// Spot observations in the realized-volatility window.
    #[serde(default = "default_realized_vol_window")]
    pub realized_vol_window: usize,
    /// Observation periods per year for annualizing realized volatility.
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            contract_multiplier: default_contract_multiplier(),
            max_underlying_exposure: default_max_underlying_exposure(),
            max_portfolio_exposure: default_max_portfolio_exposure(),
            max_drawdown: default_max_drawdown(),
            capital_preservation_floor: default_capital_preservation_floor(),
            sizing: SizingRule::default(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_contracts: default_max_contracts(),
            realized_vol_window: default_realized_vol_window(),
            periods_per_year: default_periods_per_year(),
        }
    }
}

const fn default_initial_capital() -> Decimal {
    dec!(100000)
}

const fn default_contract_multiplier() -> Decimal {
    dec!(100)
}

const fn default_max_underlying_exposure() -> Decimal {
    dec!(0.25)
}

const fn default_max_portfolio_exposure() -> Decimal {
    dec!(0.60)
}

const fn default_max_drawdown() -> Decimal {
    dec!(0.20)
}

const fn default_capital_preservation_floor() -> Decimal {
    dec!(0.50)
}

const fn default_stop_loss_pct() -> Decimal {
    dec!(0.50)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_take_profit_pct() -> Option<Decimal> {
    Some(dec!(1.00))
}

const fn default_max_contracts() -> u32 {
    100
}

const fn default_realized_vol_window() -> usize {
    20
}

const fn default_periods_per_year() -> f64 {
    252.0
}
