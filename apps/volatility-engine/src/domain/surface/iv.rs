//! Implied Volatility Solver
//!
//! Inverts Black-Scholes from an observed option premium:
//! - Newton-Raphson: Fast convergence (2-4 iterations) for well-behaved cases
//! - Modified Corrado-Miller: Initial guess for Newton-Raphson
//! - Bisection: Guaranteed convergence for edge cases (deep ITM/OTM)
//! - Hybrid: Newton-Raphson with bisection fallback
//!
//! A solve either returns a finite volatility inside `[min_vol, max_vol]` or an
//! [`IvError`]; it never substitutes a placeholder value.

#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

use super::pricing::{bs_price, bs_vega, intrinsic};
use crate::domain::shared::OptionKind;

/// Errors from IV computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IvError {
    /// Convergence failed after max iterations.
    #[error(
        "IV solver failed to converge after {iterations} iterations (last error: {last_error:.6})"
    )]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: u32,
        /// Last price error.
        last_error: f64,
    },

    /// Invalid input parameters.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message.
        message: String,
    },

    /// No solution exists (e.g., price below intrinsic value).
    #[error("No valid IV solution: {reason}")]
    NoSolution {
        /// Reason no solution exists.
        reason: String,
    },
}

/// Configuration for IV solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IvSolverConfig {
    /// Maximum iterations for Newton-Raphson and bisection.
    pub max_iterations: u32,
    /// Convergence tolerance (absolute price error).
    pub tolerance: f64,
    /// Minimum volatility bound (e.g., 0.001 = 0.1%).
    pub min_vol: f64,
    /// Maximum volatility bound (e.g., 5.0 = 500%).
    pub max_vol: f64,
    /// Switch to bisection when |ln(S/K)| exceeds this.
    pub hybrid_threshold: f64,
}

impl Default for IvSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            min_vol: 0.001,
            max_vol: 5.0,
            hybrid_threshold: 0.20,
        }
    }
}

/// Implied Volatility Solver.
#[derive(Debug, Clone)]
pub struct IvSolver {
    config: IvSolverConfig,
}

impl Default for IvSolver {
    fn default() -> Self {
        Self::new(IvSolverConfig::default())
    }
}

impl IvSolver {
    /// Create a new IV solver with the given configuration.
    #[must_use]
    pub const fn new(config: IvSolverConfig) -> Self {
        Self { config }
    }

    /// Solver configuration.
    #[must_use]
    pub const fn config(&self) -> &IvSolverConfig {
        &self.config
    }

    /// Compute implied volatility using the hybrid approach.
    ///
    /// Uses Newton-Raphson for near-the-money options and bisection
    /// for far-from-the-money options where vega is small.
    ///
    /// # Arguments
    ///
    /// * `market_price` - Observed option premium (quote mid)
    /// * `s` - Spot price of the underlying
    /// * `k` - Strike price
    /// * `t` - Time to expiration (years)
    /// * `r` - Risk-free rate (annualized, continuous)
    /// * `q` - Dividend yield (continuous)
    /// * `kind` - Option type (Call or Put)
    ///
    /// # Errors
    ///
    /// Returns an error if inputs are out of domain, the premium violates
    /// no-arbitrage bounds, or the solver fails to converge.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        q: f64,
        kind: OptionKind,
    ) -> Result<f64, IvError> {
        Self::validate_inputs(market_price, s, k, t, r, q)?;

        let floor = intrinsic(s, k, t, r, q, kind);
        if market_price < floor - self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) is below intrinsic value ({floor:.4})"
                ),
            });
        }

        let ceiling = match kind {
            OptionKind::Call => s * (-q * t).exp(),
            OptionKind::Put => k * (-r * t).exp(),
        };
        if market_price >= ceiling {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) is at or above the no-arbitrage ceiling ({ceiling:.4})"
                ),
            });
        }

        let moneyness = ((s / k).ln()).abs();

        let sigma = if moneyness > self.config.hybrid_threshold {
            self.bisection(market_price, s, k, t, r, q, kind)?
        } else {
            let initial_guess = self.corrado_miller_guess(market_price, s, k, t, r, q, kind);
            self.newton_raphson(market_price, s, k, t, r, q, kind, initial_guess)
                .or_else(|_| self.bisection(market_price, s, k, t, r, q, kind))?
        };

        if sigma.is_finite() && sigma >= 0.0 {
            Ok(sigma)
        } else {
            Err(IvError::NoSolution {
                reason: format!("solver produced non-finite volatility {sigma}"),
            })
        }
    }

    fn validate_inputs(
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        q: f64,
    ) -> Result<(), IvError> {
        let checks = [
            ("Market price", market_price),
            ("Spot price", s),
            ("Strike price", k),
            ("Time to expiration", t),
        ];
        for (name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(IvError::InvalidInput {
                    message: format!("{name} must be positive and finite, got: {value}"),
                });
            }
        }
        if !r.is_finite() || !q.is_finite() {
            return Err(IvError::InvalidInput {
                message: format!("Rate and dividend yield must be finite, got: r={r}, q={q}"),
            });
        }
        Ok(())
    }

    /// Modified Corrado-Miller initial guess for Newton-Raphson.
    #[allow(clippy::too_many_arguments)]
    fn corrado_miller_guess(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        q: f64,
        kind: OptionKind,
    ) -> f64 {
        let f = s * ((r - q) * t).exp();
        let df = (-r * t).exp();

        // Convert to call price if put (put-call parity)
        let call_price = match kind {
            OptionKind::Call => market_price,
            OptionKind::Put => market_price + df * (f - k),
        };

        let x = f - k;
        let y = call_price / df;

        if y <= 0.0 {
            return 0.30;
        }

        let numerator = y - 0.5 * x;
        let sqrt_term = (y - 0.5 * x).powi(2) - (x.powi(2) / PI);

        if sqrt_term < 0.0 {
            return 0.30;
        }

        let sigma_approx = (2.0 * PI / t).sqrt() * (numerator + sqrt_term.sqrt()) / (f + k);

        sigma_approx.clamp(self.config.min_vol, self.config.max_vol)
    }

    #[allow(clippy::too_many_arguments)]
    fn newton_raphson(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        q: f64,
        kind: OptionKind,
        initial_guess: f64,
    ) -> Result<f64, IvError> {
        let mut sigma = initial_guess.clamp(self.config.min_vol, self.config.max_vol);

        for i in 0..self.config.max_iterations {
            let price = bs_price(s, k, t, r, q, sigma, kind);
            let error = price - market_price;

            if error.abs() < self.config.tolerance {
                return Ok(sigma);
            }

            let vega = bs_vega(s, k, t, r, q, sigma);

            if vega.abs() < 1e-12 {
                return Err(IvError::ConvergenceFailed {
                    iterations: i,
                    last_error: error.abs(),
                });
            }

            sigma -= error / vega;
            sigma = sigma.clamp(self.config.min_vol, self.config.max_vol);
        }

        Err(IvError::ConvergenceFailed {
            iterations: self.config.max_iterations,
            last_error: (bs_price(s, k, t, r, q, sigma, kind) - market_price).abs(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn bisection(
        &self,
        market_price: f64,
        s: f64,
        k: f64,
        t: f64,
        r: f64,
        q: f64,
        kind: OptionKind,
    ) -> Result<f64, IvError> {
        let mut low = self.config.min_vol;
        let mut high = self.config.max_vol;

        let price_low = bs_price(s, k, t, r, q, low, kind);
        let price_high = bs_price(s, k, t, r, q, high, kind);

        if market_price < price_low - self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) is below minimum theoretical price ({price_low:.4})"
                ),
            });
        }
        if market_price > price_high + self.config.tolerance {
            return Err(IvError::NoSolution {
                reason: format!(
                    "Market price ({market_price:.4}) exceeds maximum theoretical price ({price_high:.4})"
                ),
            });
        }

        for _ in 0..self.config.max_iterations {
            let mid = low.midpoint(high);
            let error = bs_price(s, k, t, r, q, mid, kind) - market_price;

            if error.abs() < self.config.tolerance {
                return Ok(mid);
            }

            if error > 0.0 {
                high = mid;
            } else {
                low = mid;
            }

            if (high - low) < 1e-10 {
                return Ok(mid);
            }
        }

        Err(IvError::ConvergenceFailed {
            iterations: self.config.max_iterations,
            last_error: (bs_price(s, k, t, r, q, low.midpoint(high), kind) - market_price).abs(),
        })
    }
}
