//! Volatility surface context: quote inversion, interpolation and shape metrics.

mod engine;
mod exclusion;
mod interpolation;
mod iv;
pub mod pricing;
mod quote;
mod surface;

pub use engine::{MarketContext, SurfaceError, VolatilitySurfaceEngine};
pub use exclusion::{ExcludedQuote, ExclusionReason};
pub use interpolation::{MonotoneCubic, interpolate_total_variance};
pub use iv::{IvError, IvSolver, IvSolverConfig};
pub use pricing::Greeks;
pub use quote::OptionQuote;
pub use surface::{SurfaceMetrics, VolatilityPoint, VolatilitySurface, WingMoneyness, band_for};
