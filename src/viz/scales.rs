//! Logarithmic value-to-pixel scale for the scatter size channel.

use crate::stats::compute_extent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LogScale {
    /// Fit a log scale to the positive finite values in `values`.
    ///
    /// `None` when no value can sit on a log scale.
    pub fn fit<T>(values: &[T], accessor: impl Fn(&T) -> f64, range: (f64, f64)) -> Option<Self> {
        let positive = |t: &T| {
            let v = accessor(t);
            if v > 0.0 && v.is_finite() { v } else { f64::NAN }
        };
        match compute_extent(values, positive, None, None) {
            (Some(lo), Some(hi)) => Some(Self {
                domain: (lo, hi),
                range,
            }),
            _ => None,
        }
    }

    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Map `v` into the range, clamped. `None` for values a log scale cannot
    /// represent.
    pub fn map(&self, v: f64) -> Option<f64> {
        if v.is_nan() || v <= 0.0 || v.is_infinite() {
            return None;
        }
        let (d0, d1) = (self.domain.0.ln(), self.domain.1.ln());
        let (r0, r1) = self.range;
        if (d1 - d0).abs() < f64::EPSILON {
            return Some((r0 + r1) / 2.0);
        }
        let t = ((v.ln() - d0) / (d1 - d0)).clamp(0.0, 1.0);
        Some(r0 + t * (r1 - r0))
    }

    /// Like `map`, falling back to the low end of the range.
    pub fn map_or_min(&self, v: f64) -> f64 {
        self.map(v).unwrap_or(self.range.0)
    }
}
