//! Smile and term-structure interpolation.
//!
//! Across strikes: monotone piecewise-cubic Hermite (Fritsch–Carlson), which
//! never overshoots between quoted points. Across expiries: linear in total
//! variance `σ²·T`. Both extrapolate flat outside the quoted range.

#![allow(clippy::suboptimal_flops)]

/// Monotone cubic interpolant over strictly increasing abscissae.
#[derive(Debug, Clone)]
pub struct MonotoneCubic {
    xs: Vec<f64>,
    ys: Vec<f64>,
    slopes: Vec<f64>,
}

impl MonotoneCubic {
    /// Build an interpolant. Returns `None` if there are no points or the
    /// abscissae are not strictly increasing and finite.
    #[must_use]
    pub fn new(points: &[(f64, f64)]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let ordered = points.windows(2).all(|w| w[0].0 < w[1].0);
        let finite = points.iter().all(|(x, y)| x.is_finite() && y.is_finite());
        if !ordered || !finite {
            return None;
        }

        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let slopes = fritsch_carlson_slopes(&xs, &ys);
        Some(Self { xs, ys, slopes })
    }

    /// Interpolated value at `x`, flat outside the range. NaN maps to NaN.
    #[must_use]
    pub fn value(&self, x: f64) -> f64 {
        match self.segment(x) {
            Segment::Undefined => f64::NAN,
            Segment::Below => self.ys[0],
            Segment::Above => self.ys[self.ys.len() - 1],
            Segment::Inside(k) => {
                let h = self.xs[k + 1] - self.xs[k];
                let t = (x - self.xs[k]) / h;
                let t2 = t * t;
                let t3 = t2 * t;
                let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
                let h10 = t3 - 2.0 * t2 + t;
                let h01 = -2.0 * t3 + 3.0 * t2;
                let h11 = t3 - t2;
                h00 * self.ys[k]
                    + h10 * h * self.slopes[k]
                    + h01 * self.ys[k + 1]
                    + h11 * h * self.slopes[k + 1]
            }
        }
    }

    /// First derivative at `x`; zero outside the range.
    #[must_use]
    pub fn derivative(&self, x: f64) -> f64 {
        match self.segment(x) {
            Segment::Undefined => f64::NAN,
            Segment::Below | Segment::Above => 0.0,
            Segment::Inside(k) => {
                let h = self.xs[k + 1] - self.xs[k];
                let t = (x - self.xs[k]) / h;
                let t2 = t * t;
                let d00 = (6.0 * t2 - 6.0 * t) / h;
                let d10 = 3.0 * t2 - 4.0 * t + 1.0;
                let d01 = (-6.0 * t2 + 6.0 * t) / h;
                let d11 = 3.0 * t2 - 2.0 * t;
                d00 * self.ys[k]
                    + d10 * self.slopes[k]
                    + d01 * self.ys[k + 1]
                    + d11 * self.slopes[k + 1]
            }
        }
    }

    fn segment(&self, x: f64) -> Segment {
        if x.is_nan() {
            return Segment::Undefined;
        }
        let last = self.xs.len() - 1;
        if self.xs.len() == 1 || x <= self.xs[0] {
            return if self.xs.len() > 1 && x == self.xs[0] {
                Segment::Inside(0)
            } else {
                Segment::Below
            };
        }
        if x >= self.xs[last] {
            return if x == self.xs[last] {
                Segment::Inside(last - 1)
            } else {
                Segment::Above
            };
        }
        // first index whose abscissa exceeds x, minus one
        let upper = self.xs.partition_point(|&xi| xi <= x);
        Segment::Inside(upper - 1)
    }
}

enum Segment {
    Undefined,
    Below,
    Above,
    Inside(usize),
}

fn fritsch_carlson_slopes(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    if n == 1 {
        return vec![0.0];
    }

    let deltas: Vec<f64> = (0..n - 1)
        .map(|k| (ys[k + 1] - ys[k]) / (xs[k + 1] - xs[k]))
        .collect();

    let mut m = vec![0.0; n];
    m[0] = deltas[0];
    m[n - 1] = deltas[n - 2];
    for k in 1..n - 1 {
        let (left, right) = (deltas[k - 1], deltas[k]);
        m[k] = if left * right <= 0.0 {
            0.0
        } else {
            (left + right) / 2.0
        };
    }

    for k in 0..n - 1 {
        let d = deltas[k];
        if d == 0.0 {
            m[k] = 0.0;
            m[k + 1] = 0.0;
            continue;
        }
        let a = m[k] / d;
        let b = m[k + 1] / d;
        let norm = a * a + b * b;
        if norm > 9.0 {
            let tau = 3.0 / norm.sqrt();
            m[k] = tau * a * d;
            m[k + 1] = tau * b * d;
        }
    }
    m
}

/// Interpolate volatility in time, linear in total variance between two
/// slices `(t0, iv0)` and `(t1, iv1)` with `t0 < t1`. Flat outside.
#[must_use]
pub fn interpolate_total_variance(t: f64, near: (f64, f64), far: (f64, f64)) -> f64 {
    let (t0, iv0) = near;
    let (t1, iv1) = far;
    if t <= t0 || t1 <= t0 {
        return iv0;
    }
    if t >= t1 {
        return iv1;
    }
    let w0 = iv0 * iv0 * t0;
    let w1 = iv1 * iv1 * t1;
    let w = w0 + (w1 - w0) * (t - t0) / (t1 - t0);
    (w.max(0.0) / t).sqrt()
}
