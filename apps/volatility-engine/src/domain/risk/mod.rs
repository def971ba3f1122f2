//! Risk: constraint checks, sizing, exit levels and capital bookkeeping.

mod decision;
mod manager;
mod portfolio;
mod realized_vol;
mod sizing;

pub use decision::{ApprovedTrade, RiskConstraint, RiskDecision, RiskRejection};
pub use manager::{RiskManager, exit_levels};
pub use portfolio::{CapitalAccount, PortfolioSnapshot};
pub use realized_vol::RealizedVolatility;
pub use sizing::SizingRule;
