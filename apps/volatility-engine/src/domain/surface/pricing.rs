//! Black-Scholes pricing and Greeks.
//!
//! Closed-form European pricing with continuous dividend yield. Used both for
//! implied-volatility inversion and for the Greeks attached to every surface
//! point.

// Black-Scholes uses standard mathematical notation (s, k, t, r, q, sigma)
// Financial formulas use standard notation where mul_add() obscures meaning
#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::domain::shared::OptionKind;

/// Calendar days per year used for theta and year fractions.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Standard normal CDF (cumulative distribution function).
pub(crate) fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF (probability density function).
pub(crate) fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Black-Scholes d1 parameter.
pub(crate) fn d1(s: f64, k: f64, t: f64, r: f64, q: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Black-Scholes d2 parameter.
pub(crate) fn d2(s: f64, k: f64, t: f64, r: f64, q: f64, sigma: f64) -> f64 {
    d1(s, k, t, r, q, sigma) - sigma * t.sqrt()
}

/// Black-Scholes price for either call or put.
#[must_use]
pub fn bs_price(s: f64, k: f64, t: f64, r: f64, q: f64, sigma: f64, kind: OptionKind) -> f64 {
    let d1_val = d1(s, k, t, r, q, sigma);
    let d2_val = d2(s, k, t, r, q, sigma);
    match kind {
        OptionKind::Call => {
            s * (-q * t).exp() * norm_cdf(d1_val) - k * (-r * t).exp() * norm_cdf(d2_val)
        }
        OptionKind::Put => {
            k * (-r * t).exp() * norm_cdf(-d2_val) - s * (-q * t).exp() * norm_cdf(-d1_val)
        }
    }
}

/// Raw Black-Scholes vega (price change per 1.0 of volatility).
pub(crate) fn bs_vega(s: f64, k: f64, t: f64, r: f64, q: f64, sigma: f64) -> f64 {
    let d1_val = d1(s, k, t, r, q, sigma);
    s * (-q * t).exp() * norm_pdf(d1_val) * t.sqrt()
}

/// Discounted intrinsic value, the no-arbitrage lower bound for a European option.
pub(crate) fn intrinsic(s: f64, k: f64, t: f64, r: f64, q: f64, kind: OptionKind) -> f64 {
    match kind {
        OptionKind::Call => (s * (-q * t).exp() - k * (-r * t).exp()).max(0.0),
        OptionKind::Put => (k * (-r * t).exp() - s * (-q * t).exp()).max(0.0),
    }
}

/// Forward price of the underlying.
#[must_use]
pub fn forward(s: f64, t: f64, r: f64, q: f64) -> f64 {
    s * ((r - q) * t).exp()
}

/// Option sensitivities at a given volatility.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Greeks {
    /// dV/dS.
    pub delta: f64,
    /// d²V/dS².
    pub gamma: f64,
    /// dV per 1 volatility point (0.01).
    pub vega: f64,
    /// dV per calendar day of elapsed time.
    pub theta: f64,
}

impl Greeks {
    /// Compute Black-Scholes Greeks.
    #[must_use]
    pub fn compute(s: f64, k: f64, t: f64, r: f64, q: f64, sigma: f64, kind: OptionKind) -> Self {
        let sqrt_t = t.sqrt();
        let d1_val = d1(s, k, t, r, q, sigma);
        let d2_val = d1_val - sigma * sqrt_t;
        let div_df = (-q * t).exp();
        let rate_df = (-r * t).exp();
        let pdf = norm_pdf(d1_val);

        let gamma = div_df * pdf / (s * sigma * sqrt_t);
        let vega = s * div_df * pdf * sqrt_t / 100.0;
        let decay = -s * div_df * pdf * sigma / (2.0 * sqrt_t);

        let (delta, theta_annual) = match kind {
            OptionKind::Call => (
                div_df * norm_cdf(d1_val),
                decay - r * k * rate_df * norm_cdf(d2_val) + q * s * div_df * norm_cdf(d1_val),
            ),
            OptionKind::Put => (
                div_df * (norm_cdf(d1_val) - 1.0),
                decay + r * k * rate_df * norm_cdf(-d2_val) - q * s * div_df * norm_cdf(-d1_val),
            ),
        };

        Self {
            delta,
            gamma,
            vega,
            theta: theta_annual / DAYS_PER_YEAR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_norm_cdf() {
        assert!(approx_eq(norm_cdf(0.0), 0.5, 1e-6));
        assert!(approx_eq(norm_cdf(1.96), 0.975, 0.001));
        assert!(approx_eq(norm_cdf(-1.96), 0.025, 0.001));
    }

    #[test]
    fn test_bs_call_atm() {
        let price = bs_price(100.0, 100.0, 1.0, 0.05, 0.0, 0.20, OptionKind::Call);
        assert!(approx_eq(price, 10.45, 0.1));
    }

    #[test]
    fn test_put_call_parity() {
        let (s, k, t, r, q, sigma) = (100.0, 95.0, 0.5, 0.03, 0.01, 0.25);
        let call = bs_price(s, k, t, r, q, sigma, OptionKind::Call);
        let put = bs_price(s, k, t, r, q, sigma, OptionKind::Put);
        let parity = s * (-q * t).exp() - k * (-r * t).exp();
        assert!(approx_eq(call - put, parity, 1e-9));
    }

    #[test]
    fn test_greeks_atm_call() {
        let g = Greeks::compute(100.0, 100.0, 1.0, 0.05, 0.0, 0.20, OptionKind::Call);
        assert!(approx_eq(g.delta, 0.6368, 0.001));
        assert!(approx_eq(g.gamma, 0.01876, 0.0005));
        // 37.52 per unit vol -> 0.375 per vol point
        assert!(approx_eq(g.vega, 0.3752, 0.002));
        // -6.41 per year -> about -0.0175 per day
        assert!(approx_eq(g.theta, -6.414 / DAYS_PER_YEAR, 0.0005));
    }

    #[test]
    fn test_put_delta_is_call_delta_minus_one() {
        let call = Greeks::compute(100.0, 110.0, 0.25, 0.02, 0.0, 0.3, OptionKind::Call);
        let put = Greeks::compute(100.0, 110.0, 0.25, 0.02, 0.0, 0.3, OptionKind::Put);
        assert!(approx_eq(call.delta - put.delta, 1.0, 1e-9));
        assert!(approx_eq(call.gamma, put.gamma, 1e-12));
        assert!(approx_eq(call.vega, put.vega, 1e-12));
    }
}
