//! Domain Layer
//!
//! Business logic with no I/O. Each bounded context owns its types, errors and
//! invariants:
//!
//! - [`surface`]: quote inversion, interpolation, shape metrics
//! - [`anomaly`]: rolling baselines and anomaly episodes
//! - [`signal`]: anomaly correlation, trade signals and their lifecycle
//! - [`risk`]: constraint checks, sizing, exit levels, capital
//! - [`order`]: order lifecycle and fills
//! - [`ledger`]: positions and P&L

pub mod anomaly;
pub mod ledger;
pub mod order;
pub mod risk;
pub mod shared;
pub mod signal;
pub mod surface;
