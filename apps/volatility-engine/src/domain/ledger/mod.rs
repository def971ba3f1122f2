//! Position ledger.

mod book;
mod errors;
mod position;

pub use book::{LedgerFill, LedgerOutcome, LedgerSnapshot, PositionLedger};
pub use errors::LedgerError;
pub use position::{ExitReason, ExitTrigger, Position, PositionStatus};
