//! Dual-axis time chart: record counts as bars on a log axis, the selected
//! indicator as a line with points on a linear secondary axis, and a band of
//! conflict marks.
//!
//! Bars run from the axis floor (0.5) to `max(count, 1)`, so a year without
//! records still shows as a thin bar. The indicator line is broken at `NaN`
//! values instead of interpolating across them.

use anyhow::{Result, anyhow};
use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use std::path::Path;

use super::ensure_fonts_registered;
use super::legend::{draw_legend, estimate_legend_height_px};
use super::types::{LegendItem, Swatch, TimelineConfig};
use super::util::{
    BAR_BLUE, CONFLICT_RED, LINE_ORANGE, desaturate, format_count, format_value, label_area_px,
    map_locale, padded_range,
};
use crate::models::MergedYearRow;
use crate::stats::compute_extent;

const MARGIN: u32 = 16;
/// Bottom of the count axis; bars start here.
const BAR_FLOOR: f64 = 0.5;

/// Split rows into runs of consecutive non-`NaN` indicator values.
pub fn line_segments(rows: &[MergedYearRow]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut cur = Vec::new();
    for row in rows {
        if row.value.is_nan() {
            if !cur.is_empty() {
                segments.push(std::mem::take(&mut cur));
            }
        } else {
            cur.push((row.year as f64, row.value));
        }
    }
    if !cur.is_empty() {
        segments.push(cur);
    }
    segments
}

/// Legend entries for the three series.
pub fn timeline_legend(indicator_desc: &str, loading: bool) -> Vec<LegendItem> {
    let c = |rgb: RGBColor| {
        if loading {
            desaturate(rgb.to_rgba())
        } else {
            rgb.to_rgba()
        }
    };
    vec![
        LegendItem::new("Records", c(BAR_BLUE), Swatch::Bar),
        LegendItem::new(indicator_desc, c(LINE_ORANGE), Swatch::Line),
        LegendItem::new("Armed conflict", c(CONFLICT_RED), Swatch::Flag),
    ]
}

/// Render to `out_path`; `.svg` selects the SVG backend, anything else PNG.
pub fn plot_timeline<P: AsRef<Path>>(
    rows: &[MergedYearRow],
    cfg: &TimelineConfig,
    out_path: P,
) -> Result<()> {
    ensure_fonts_registered();
    let out_path = out_path.as_ref();
    let path_string = out_path.to_string_lossy().to_string();
    if out_path.extension().and_then(|s| s.to_str()) == Some("svg") {
        let root = SVGBackend::new(path_string.as_str(), (cfg.width, cfg.height)).into_drawing_area();
        draw_timeline(&root, rows, cfg)?;
    } else {
        let root =
            BitMapBackend::new(path_string.as_str(), (cfg.width, cfg.height)).into_drawing_area();
        draw_timeline(&root, rows, cfg)?;
    }
    Ok(())
}

/// Draw onto any backend. Clears the area first: every call is a full redraw.
pub fn draw_timeline<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[MergedYearRow],
    cfg: &TimelineConfig,
) -> Result<()> {
    root.fill(&WHITE).map_err(|e| anyhow!("{:?}", e))?;
    let (w, h) = root.dim_in_pixel();
    let locale = map_locale(&cfg.locale);

    let paint = |rgb: RGBColor| {
        if cfg.loading {
            desaturate(rgb.to_rgba())
        } else {
            rgb.to_rgba()
        }
    };
    let (bar_color, line_color, conflict_color) =
        (paint(BAR_BLUE), paint(LINE_ORANGE), paint(CONFLICT_RED));

    // Year axis is categorical: one slot per year, centered on the year.
    let (y_lo, y_hi) = match compute_extent(rows, |r| r.year as f64, None, None) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => (0.0, 1.0),
    };
    let (x0, x1) = (y_lo - 0.5, y_hi + 0.5);

    let max_count = rows.iter().map(|r| r.record_count).max().unwrap_or(0).max(1) as f64;
    let count_top = max_count * 1.6;

    let (v0, v1) = {
        let (lo, hi) = compute_extent(rows, |r| r.value, cfg.value_bounds.0, cfg.value_bounds.1);
        padded_range(
            cfg.value_bounds.0.or(lo).unwrap_or(0.0),
            cfg.value_bounds.1.or(hi).unwrap_or(1.0),
        )
    };

    let count_label = format_count(max_count, locale);
    let left_px = label_area_px([count_label.as_str()], 12);
    let right_px = label_area_px([format_value(v1).as_str()], 12);

    let legend = timeline_legend(&cfg.indicator_desc, cfg.loading);
    let legend_h = estimate_legend_height_px(&legend, (MARGIN + left_px) as i32, w as i32);
    let (plot_area, legend_area) = root.split_vertically((h as i32 - legend_h).max(40));

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(MARGIN)
        .caption(cfg.title.trim(), (FontFamily::SansSerif, 22))
        .set_label_area_size(LabelAreaPosition::Left, left_px)
        .set_label_area_size(LabelAreaPosition::Right, right_px)
        .set_label_area_size(LabelAreaPosition::Bottom, 48)
        .build_cartesian_2d(x0..x1, (BAR_FLOOR..count_top).log_scale())
        .map_err(|e| anyhow!("{:?}", e))?
        .set_secondary_coord(x0..x1, v0..v1);

    let year_count = (y_hi - y_lo) as usize + 1;
    let year_fmt = |v: &f64| {
        if (v - v.round()).abs() < 1e-6 {
            format!("{}", v.round() as i64)
        } else {
            String::new()
        }
    };
    let count_fmt = |v: &f64| format_count(*v, locale);
    let value_fmt = |v: &f64| format_value(*v);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Year")
        .y_desc("Records")
        .x_labels(year_count.min(12))
        .x_label_formatter(&year_fmt)
        .y_label_formatter(&count_fmt)
        .label_style((FontFamily::SansSerif, 12))
        .axis_desc_style((FontFamily::SansSerif, 15))
        .light_line_style(&BLACK.mix(0.05))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    chart
        .configure_secondary_axes()
        .y_desc(cfg.indicator_desc.as_str())
        .y_label_formatter(&value_fmt)
        .label_style((FontFamily::SansSerif, 12))
        .axis_desc_style((FontFamily::SansSerif, 15))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    chart
        .draw_series(rows.iter().map(|r| {
            let x = r.year as f64;
            let top = (r.record_count.max(1) as f64).max(BAR_FLOOR);
            Rectangle::new([(x - 0.4, BAR_FLOOR), (x + 0.4, top)], bar_color.filled())
        }))
        .map_err(|e| anyhow!("{:?}", e))?;

    for segment in line_segments(rows) {
        chart
            .draw_secondary_series(LineSeries::new(
                segment.iter().copied(),
                line_color.stroke_width(2),
            ))
            .map_err(|e| anyhow!("{:?}", e))?;
        chart
            .draw_secondary_series(
                segment
                    .iter()
                    .map(|&(x, v)| Circle::new((x, v), 3, line_color.filled())),
            )
            .map_err(|e| anyhow!("{:?}", e))?;
    }

    let band_y = v1 - (v1 - v0) * 0.04;
    chart
        .draw_secondary_series(
            rows.iter()
                .filter(|r| r.conflict == Some(true))
                .map(|r| TriangleMarker::new((r.year as f64, band_y), 5, conflict_color.filled())),
        )
        .map_err(|e| anyhow!("{:?}", e))?;

    draw_legend(&legend_area, &legend, (MARGIN + left_px) as i32)?;
    root.present().map_err(|e| anyhow!("{:?}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: i32, value: f64) -> MergedYearRow {
        MergedYearRow {
            year,
            value,
            record_count: 0,
            conflict: None,
            regime: f64::NAN,
        }
    }

    #[test]
    fn nan_values_break_the_line() {
        let rows = vec![
            row(2000, 0.1),
            row(2001, f64::NAN),
            row(2002, 0.3),
            row(2003, 0.4),
        ];
        let segs = line_segments(&rows);
        assert_eq!(segs, vec![vec![(2000.0, 0.1)], vec![(2002.0, 0.3), (2003.0, 0.4)]]);
    }

    #[test]
    fn all_nan_gives_no_segments() {
        assert!(line_segments(&[row(2000, f64::NAN)]).is_empty());
    }
}
