//! Numeric helpers shared by aggregation and rendering: extents, NaN checks,
//! medians and the valid-year policy for indicators.

use crate::models::{Indicator, YearWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value range of `accessor` over `data`.
///
/// Forced bounds are returned unchanged; a missing bound is the plain min or
/// max over the data (`NaN` values do not participate). An empty dataset
/// yields `None` for every bound that had to be computed.
pub fn compute_extent<T>(
    data: &[T],
    accessor: impl Fn(&T) -> f64,
    min: Option<f64>,
    max: Option<f64>,
) -> (Option<f64>, Option<f64>) {
    if let (Some(lo), Some(hi)) = (min, max) {
        return (Some(lo), Some(hi));
    }
    let mut lo: Option<f64> = None;
    let mut hi: Option<f64> = None;
    for v in data.iter().map(&accessor).filter(|v| !v.is_nan()) {
        lo = Some(lo.map_or(v, |l| l.min(v)));
        hi = Some(hi.map_or(v, |h| h.max(v)));
    }
    (min.or(lo), max.or(hi))
}

/// Values that can be checked for `NaN`: a single number or a tuple of fields.
pub trait NanCheck {
    fn has_nan(&self) -> bool;
}

impl NanCheck for f64 {
    fn has_nan(&self) -> bool {
        self.is_nan()
    }
}

impl NanCheck for (f64, f64) {
    fn has_nan(&self) -> bool {
        self.0.is_nan() || self.1.is_nan()
    }
}

impl NanCheck for (f64, f64, f64) {
    fn has_nan(&self) -> bool {
        self.0.is_nan() || self.1.is_nan() || self.2.is_nan()
    }
}

impl NanCheck for [f64] {
    fn has_nan(&self) -> bool {
        self.iter().any(|v| v.is_nan())
    }
}

impl NanCheck for Vec<f64> {
    fn has_nan(&self) -> bool {
        self.as_slice().has_nan()
    }
}

/// True iff the value resolved for any element contains a `NaN`.
pub fn any_nan<T, V: NanCheck>(items: &[T], accessor: impl Fn(&T) -> V) -> bool {
    items.iter().any(|item| accessor(item).has_nan())
}

/// Inclusive containment test.
pub fn is_within_range<T: PartialOrd>(value: T, range: (T, T)) -> bool {
    value >= range.0 && value <= range.1
}

/// Middle of the sorted values (mean of the two middle values for even
/// lengths). `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut vals = values.to_vec();
    vals.sort_by(|a, b| a.total_cmp(b));
    let count = vals.len();
    if count % 2 == 1 {
        Some(vals[count / 2])
    } else {
        Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
    }
}

/// Per-indicator first and last valid years, narrowing the study range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YearOverrides {
    pub start: BTreeMap<Indicator, i32>,
    pub stop: BTreeMap<Indicator, i32>,
}

impl YearOverrides {
    /// Overrides for indicators whose coverage is shorter than the study range.
    pub fn builtin() -> Self {
        YearOverrides::default()
            .with_start(Indicator::CivilSocietyParticipation, 1970)
            .with_stop(Indicator::PhysicalIntegrity, 2017)
    }

    pub fn with_start(mut self, indicator: Indicator, year: i32) -> Self {
        self.start.insert(indicator, year);
        self
    }

    pub fn with_stop(mut self, indicator: Indicator, year: i32) -> Self {
        self.stop.insert(indicator, year);
        self
    }

    /// Valid years of one indicator within `lo..=hi`.
    pub fn window_for(&self, indicator: Indicator, lo: i32, hi: i32) -> YearWindow {
        let start = self.start.get(&indicator).map_or(lo, |s| lo.max(*s));
        let stop = self.stop.get(&indicator).map_or(hi, |s| hi.min(*s));
        YearWindow::new(start, stop)
    }
}

/// Effective valid range for a set of indicators: the latest start and the
/// earliest stop across all of them, within `lo..=hi`.
///
/// The result may be empty (`start > end`) when the indicators do not overlap.
pub fn valid_years(
    indicators: &[Indicator],
    lo: i32,
    hi: i32,
    overrides: &YearOverrides,
) -> YearWindow {
    indicators
        .iter()
        .map(|ind| overrides.window_for(*ind, lo, hi))
        .fold(YearWindow::new(lo, hi), |acc, w| acc.intersect(&w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_ignores_nan_and_respects_one_forced_bound() {
        let data = [3.0, f64::NAN, -1.0, 7.5];
        assert_eq!(compute_extent(&data, |v| *v, None, None), (Some(-1.0), Some(7.5)));
        assert_eq!(compute_extent(&data, |v| *v, Some(0.0), None), (Some(0.0), Some(7.5)));
        assert_eq!(compute_extent(&data, |v| *v, None, Some(1.0)), (Some(-1.0), Some(1.0)));
    }

    #[test]
    fn extent_of_empty_data_is_unusable() {
        let data: [f64; 0] = [];
        assert_eq!(compute_extent(&data, |v| *v, None, None), (None, None));
    }

    #[test]
    fn nan_checks_on_tuples() {
        let rows = [(1.0, 2.0, 3.0), (1.0, f64::NAN, 3.0)];
        assert!(any_nan(&rows, |r| *r));
        assert!(!any_nan(&rows[..1], |r| *r));
        assert!(!any_nan(&rows, |r| r.0));
    }

    #[test]
    fn single_indicator_override() {
        let o = YearOverrides::builtin();
        assert_eq!(
            valid_years(&[Indicator::CivilSocietyParticipation], 1960, 2018, &o),
            YearWindow::new(1970, 2018)
        );
        assert_eq!(
            valid_years(&[Indicator::Polyarchy], 1960, 2018, &o),
            YearWindow::new(1960, 2018)
        );
    }
}
