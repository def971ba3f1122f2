//! Volatility surface: points, smile slices and shape metrics.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::interpolation::{MonotoneCubic, interpolate_total_variance};
use super::pricing::Greeks;
use super::{ExcludedQuote, OptionQuote};
use crate::domain::shared::{OptionContract, OptionKind, Timestamp, UnderlyingId};

/// Implied volatility and Greeks for one quoted contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityPoint {
    /// Contract key.
    pub contract: OptionContract,
    /// Implied volatility (annualized, non-negative, finite).
    pub iv: f64,
    /// Greeks at `iv`.
    pub greeks: Greeks,
    /// Source quote bid.
    pub bid: Decimal,
    /// Source quote ask.
    pub ask: Decimal,
    /// Source quote mid.
    pub mid: Decimal,
    /// Time to expiry in years.
    pub time_to_expiry: f64,
    /// `ln(K / F)`.
    pub log_moneyness: f64,
}

impl VolatilityPoint {
    /// Strike as `f64`.
    #[must_use]
    pub fn strike(&self) -> f64 {
        self.contract.strike.to_f64().unwrap_or(f64::NAN)
    }
}

/// Shape descriptors extracted from a surface each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMetrics {
    /// At-the-money IV of the front expiry.
    pub atm_iv: f64,
    /// dIV / d(log-moneyness) at the money, front expiry.
    pub skew_slope: f64,
    /// Put-wing IV minus call-wing IV, front expiry.
    pub risk_reversal: f64,
    /// Mean wing IV minus ATM IV, front expiry.
    pub butterfly: f64,
    /// (back ATM - front ATM) per year; `None` with a single expiry.
    pub term_slope: Option<f64>,
    /// Second difference of ATM IV over the first three expiries.
    pub term_curvature: Option<f64>,
}

/// Wing placement for risk-reversal and butterfly, as strike / forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WingMoneyness {
    /// Put wing (e.g. 0.8).
    pub put: f64,
    /// Call wing (e.g. 1.2).
    pub call: f64,
}

#[derive(Debug, Clone)]
struct SmileSlice {
    expiry: Timestamp,
    time_to_expiry: f64,
    forward: f64,
    smile: MonotoneCubic,
}

impl SmileSlice {
    fn iv_at_log_moneyness(&self, k: f64) -> f64 {
        self.smile.value(k)
    }

    fn atm_iv(&self) -> f64 {
        self.smile.value(0.0)
    }
}

/// Implied volatility surface for one underlying at one instant.
#[derive(Debug, Clone)]
pub struct VolatilitySurface {
    underlying: UnderlyingId,
    as_of: Timestamp,
    spot: f64,
    points: Vec<VolatilityPoint>,
    slices: Vec<SmileSlice>,
    excluded: Vec<ExcludedQuote>,
}

impl VolatilitySurface {
    /// Assemble a surface from solved points. Points are ordered by expiry,
    /// strike, then kind. Calls and puts sharing a strike are averaged in the
    /// smile. Returns `None` if no slice could be built.
    #[must_use]
    pub fn from_points(
        underlying: UnderlyingId,
        as_of: Timestamp,
        spot: f64,
        mut points: Vec<VolatilityPoint>,
        excluded: Vec<ExcludedQuote>,
        forwards: &BTreeMap<Timestamp, f64>,
    ) -> Option<Self> {
        points.sort_by(|a, b| {
            (a.contract.expiry, a.contract.strike, a.contract.kind).cmp(&(
                b.contract.expiry,
                b.contract.strike,
                b.contract.kind,
            ))
        });

        let mut by_expiry: BTreeMap<Timestamp, BTreeMap<Decimal, (f64, f64, u32)>> =
            BTreeMap::new();
        let mut tenor: BTreeMap<Timestamp, f64> = BTreeMap::new();
        for p in &points {
            tenor.insert(p.contract.expiry, p.time_to_expiry);
            let entry = by_expiry
                .entry(p.contract.expiry)
                .or_default()
                .entry(p.contract.strike)
                .or_insert((p.log_moneyness, 0.0, 0));
            entry.1 += p.iv;
            entry.2 += 1;
        }

        let slices: Vec<SmileSlice> = by_expiry
            .into_iter()
            .filter_map(|(expiry, strikes)| {
                let nodes: Vec<(f64, f64)> = strikes
                    .values()
                    .map(|(k, sum, n)| (*k, sum / f64::from(*n)))
                    .collect();
                Some(SmileSlice {
                    expiry,
                    time_to_expiry: *tenor.get(&expiry)?,
                    forward: *forwards.get(&expiry)?,
                    smile: MonotoneCubic::new(&nodes)?,
                })
            })
            .collect();

        if slices.is_empty() {
            return None;
        }

        Some(Self {
            underlying,
            as_of,
            spot,
            points,
            slices,
            excluded,
        })
    }

    /// Underlying identifier.
    #[must_use]
    pub const fn underlying(&self) -> &UnderlyingId {
        &self.underlying
    }

    /// Build time.
    #[must_use]
    pub const fn as_of(&self) -> Timestamp {
        self.as_of
    }

    /// Spot used for the build.
    #[must_use]
    pub const fn spot(&self) -> f64 {
        self.spot
    }

    /// Ordered points.
    #[must_use]
    pub fn points(&self) -> &[VolatilityPoint] {
        &self.points
    }

    /// Quotes excluded during the build.
    #[must_use]
    pub fn excluded(&self) -> &[ExcludedQuote] {
        &self.excluded
    }

    /// Expiries with at least one valid point, ascending.
    #[must_use]
    pub fn expiries(&self) -> Vec<Timestamp> {
        self.slices.iter().map(|s| s.expiry).collect()
    }

    /// Forward price for a quoted expiry.
    #[must_use]
    pub fn forward(&self, expiry: Timestamp) -> Option<f64> {
        self.slices
            .iter()
            .find(|s| s.expiry == expiry)
            .map(|s| s.forward)
    }

    /// Point for an exact contract, if quoted and valid.
    #[must_use]
    pub fn point(&self, contract: &OptionContract) -> Option<&VolatilityPoint> {
        self.points.iter().find(|p| &p.contract == contract)
    }

    /// Interpolated IV at an arbitrary strike and time to expiry (years).
    ///
    /// Strike is mapped to log-moneyness against each bracketing slice's
    /// forward; across expiries total variance is interpolated linearly.
    /// `None` for a non-positive or non-finite strike, or a non-finite time.
    #[must_use]
    pub fn iv_at(&self, strike: f64, time_to_expiry: f64) -> Option<f64> {
        if !(strike.is_finite() && strike > 0.0 && time_to_expiry.is_finite()) {
            return None;
        }
        let at_slice = |slice: &SmileSlice| slice.iv_at_log_moneyness((strike / slice.forward).ln());

        let first = &self.slices[0];
        let last = &self.slices[self.slices.len() - 1];
        if time_to_expiry <= first.time_to_expiry {
            return Some(at_slice(first));
        }
        if time_to_expiry >= last.time_to_expiry {
            return Some(at_slice(last));
        }

        let far_idx = self
            .slices
            .partition_point(|s| s.time_to_expiry < time_to_expiry);
        let near = &self.slices[far_idx - 1];
        let far = &self.slices[far_idx];
        Some(interpolate_total_variance(
            time_to_expiry,
            (near.time_to_expiry, at_slice(near)),
            (far.time_to_expiry, at_slice(far)),
        ))
    }

    /// IV at `strike / forward = moneyness` on the slice for `expiry`.
    #[must_use]
    pub fn iv_at_moneyness(&self, expiry: Timestamp, moneyness: f64) -> Option<f64> {
        self.slices
            .iter()
            .find(|s| s.expiry == expiry && moneyness.is_finite() && moneyness > 0.0)
            .map(|s| s.iv_at_log_moneyness(moneyness.ln()))
    }

    /// Skew slope at the money for `expiry`.
    #[must_use]
    pub fn skew_slope(&self, expiry: Timestamp) -> Option<f64> {
        self.slices
            .iter()
            .find(|s| s.expiry == expiry)
            .map(|s| s.smile.derivative(0.0))
    }

    /// Expiry whose days-to-expiry is nearest `target_days`.
    #[must_use]
    pub fn nearest_expiry(&self, target_days: f64) -> Option<Timestamp> {
        self.slices
            .iter()
            .min_by(|a, b| {
                let da = (self.as_of.days_until(a.expiry) - target_days).abs();
                let db = (self.as_of.days_until(b.expiry) - target_days).abs();
                da.total_cmp(&db)
            })
            .map(|s| s.expiry)
    }

    /// Quoted point of `kind` in `expiry` whose strike is nearest the forward.
    #[must_use]
    pub fn nearest_forward_point(
        &self,
        expiry: Timestamp,
        kind: OptionKind,
    ) -> Option<&VolatilityPoint> {
        self.points
            .iter()
            .filter(|p| p.contract.expiry == expiry && p.contract.kind == kind)
            .min_by(|a, b| a.log_moneyness.abs().total_cmp(&b.log_moneyness.abs()))
    }

    /// Strike nearest the forward in `expiry` for which both a call and a put are quoted.
    #[must_use]
    pub fn straddle_strike(&self, expiry: Timestamp) -> Option<Decimal> {
        let mut calls: BTreeMap<Decimal, f64> = BTreeMap::new();
        let mut both: Vec<(Decimal, f64)> = Vec::new();
        for p in self.points.iter().filter(|p| p.contract.expiry == expiry) {
            if p.contract.kind == OptionKind::Call {
                calls.insert(p.contract.strike, p.log_moneyness);
            }
        }
        for p in self
            .points
            .iter()
            .filter(|p| p.contract.expiry == expiry && p.contract.kind == OptionKind::Put)
        {
            if let Some(k) = calls.get(&p.contract.strike) {
                both.push((p.contract.strike, k.abs()));
            }
        }
        both.into_iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(strike, _)| strike)
    }

    /// Compute shape metrics with the given wing placement.
    #[must_use]
    pub fn metrics(&self, wings: WingMoneyness) -> SurfaceMetrics {
        let front = &self.slices[0];
        let atm_iv = front.atm_iv();
        let put_wing = front.iv_at_log_moneyness(wings.put.ln());
        let call_wing = front.iv_at_log_moneyness(wings.call.ln());

        let term_slope = (self.slices.len() >= 2).then(|| {
            let back = &self.slices[self.slices.len() - 1];
            (back.atm_iv() - atm_iv) / (back.time_to_expiry - front.time_to_expiry)
        });

        let term_curvature = (self.slices.len() >= 3).then(|| {
            let (s0, s1, s2) = (&self.slices[0], &self.slices[1], &self.slices[2]);
            let left = (s1.atm_iv() - s0.atm_iv()) / (s1.time_to_expiry - s0.time_to_expiry);
            let right = (s2.atm_iv() - s1.atm_iv()) / (s2.time_to_expiry - s1.time_to_expiry);
            right - left
        });

        SurfaceMetrics {
            atm_iv,
            skew_slope: front.smile.derivative(0.0),
            risk_reversal: put_wing - call_wing,
            butterfly: f64::midpoint(put_wing, call_wing) - atm_iv,
            term_slope,
            term_curvature,
        }
    }
}

/// Entry price band for a set of legs: (sum of bids, sum of asks).
#[must_use]
pub fn band_for(points: &[&VolatilityPoint]) -> (Decimal, Decimal) {
    points
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(bid, ask), p| {
            (bid + p.bid, ask + p.ask)
        })
}

/// Build a [`VolatilityPoint`] from a quote and solved IV.
#[must_use]
pub(crate) fn point_from_quote(
    quote: &OptionQuote,
    iv: f64,
    greeks: Greeks,
    time_to_expiry: f64,
    forward: f64,
    strike: f64,
) -> VolatilityPoint {
    VolatilityPoint {
        contract: quote.contract(),
        iv,
        greeks,
        bid: quote.bid,
        ask: quote.ask,
        mid: quote.mid(),
        time_to_expiry,
        log_moneyness: (strike / forward).ln(),
    }
}
