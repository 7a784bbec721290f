//! Join the democracy table with remote facet counts into the two chart views.

use crate::models::{
    AggregatedCountryPoint, CountryFacetSeries, DemocracyRecord, Indicator, MergedYearRow, Region,
    YearFacetSeries, YearWindow,
};
use crate::stats::{YearOverrides, any_nan, median, valid_years};
use crate::storage::Datasets;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the scatter view summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScatterSelection {
    pub x: Indicator,
    pub y: Indicator,
    pub window: YearWindow,
    /// Divide record counts by country area (records per km²).
    pub normalize_by_area: bool,
}

/// Medians of one country over a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountryMedians {
    pub x: f64,
    pub y: f64,
    pub regime: f64,
}

/// Group records by country, preserving year order within each group.
pub fn group_by_country(records: &[DemocracyRecord]) -> BTreeMap<&str, Vec<&DemocracyRecord>> {
    let mut groups: BTreeMap<&str, Vec<&DemocracyRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.country.as_str()).or_default().push(r);
    }
    for rows in groups.values_mut() {
        rows.sort_by_key(|r| r.year);
    }
    groups
}

/// Medians of `x`, `y` and the regime type over the window.
///
/// `None` when the window holds no observation or when any single observation
/// lacks one of the three values: a country is rejected as a whole rather than
/// summarized over a partial subset.
pub fn country_medians(
    rows: &[&DemocracyRecord],
    x: Indicator,
    y: Indicator,
    window: &YearWindow,
) -> Option<CountryMedians> {
    let in_window: Vec<&DemocracyRecord> = rows
        .iter()
        .copied()
        .filter(|r| window.contains(r.year))
        .collect();
    if in_window.is_empty() {
        return None;
    }
    if any_nan(&in_window, |r| (r.get(x), r.get(y), r.get(Indicator::RegimeType))) {
        return None;
    }
    let xs: Vec<f64> = in_window.iter().map(|r| r.get(x)).collect();
    let ys: Vec<f64> = in_window.iter().map(|r| r.get(y)).collect();
    let regimes: Vec<f64> = in_window
        .iter()
        .map(|r| r.get(Indicator::RegimeType))
        .collect();
    Some(CountryMedians {
        x: median(&xs)?,
        y: median(&ys)?,
        regime: median(&regimes)?,
    })
}

/// Window actually used for the scatter view: the selected window narrowed to
/// the years valid for both selected indicators.
pub fn effective_window(selection: &ScatterSelection, overrides: &YearOverrides) -> YearWindow {
    valid_years(
        &[selection.x, selection.y],
        selection.window.start,
        selection.window.end,
        overrides,
    )
}

/// Per-country summary points for the scatter view.
///
/// Countries are dropped when their medians are incomplete, when they are
/// absent from `facet` or have no records (the size channel is logarithmic),
/// or when normalization is requested but their area is unknown.
pub fn scatter_points(
    data: &Datasets,
    facet: &CountryFacetSeries,
    selection: &ScatterSelection,
    overrides: &YearOverrides,
) -> Vec<AggregatedCountryPoint> {
    let window = effective_window(selection, overrides);
    if window.is_empty() {
        debug!(
            "{} and {} share no valid years in {}",
            selection.x, selection.y, selection.window
        );
        return Vec::new();
    }

    let mut out = Vec::new();
    for (country, rows) in group_by_country(&data.democracy) {
        let Some(medians) = country_medians(&rows, selection.x, selection.y, &window) else {
            continue;
        };
        let raw = match facet.get(country) {
            Some(c) if *c > 0 => *c,
            _ => continue,
        };
        let meta = data.country(country);
        let area = meta.map_or(f64::NAN, |m| m.area);
        let record_count = if selection.normalize_by_area {
            if area.is_nan() || area <= 0.0 {
                debug!("dropping {country}: no area to normalize by");
                continue;
            }
            raw as f64 / area
        } else {
            raw as f64
        };
        out.push(AggregatedCountryPoint {
            country: country.to_string(),
            name: meta.map_or_else(|| country.to_string(), |m| m.display_name.clone()),
            region: meta.map_or(Region::Unknown, |m| m.region),
            area,
            x: medians.x,
            y: medians.y,
            regime_median: medians.regime,
            record_count,
            raw_record_count: raw,
        });
    }
    out
}

/// Year rows of one country for the time-series view.
///
/// Every democracy row in the window is kept; years missing from `facet`
/// get zero records.
pub fn timeline_rows(
    records: &[DemocracyRecord],
    country: &str,
    indicator: Indicator,
    window: &YearWindow,
    facet: &YearFacetSeries,
) -> Vec<MergedYearRow> {
    let mut rows: Vec<MergedYearRow> = records
        .iter()
        .filter(|r| r.country == country && window.contains(r.year))
        .map(|r| MergedYearRow {
            year: r.year,
            value: r.get(indicator),
            record_count: facet.get(&r.year).copied().unwrap_or(0),
            conflict: r.conflict_flag(),
            regime: r.get(Indicator::RegimeType),
        })
        .collect();
    rows.sort_by_key(|r| r.year);
    rows
}
