//! Country scatter: two linear position channels, a log-scaled size channel
//! and a color channel.
//!
//! Rendering returns a [`ScatterLayout`] with the pixel geometry of every
//! mark, so a host can resolve pointer positions to countries without
//! re-running the scales.

use anyhow::{Result, anyhow};
use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use std::path::Path;

use super::ensure_fonts_registered;
use super::legend::{draw_legend, estimate_legend_height_px};
use super::scales::LogScale;
use super::types::{LegendItem, ScatterConfig, Swatch};
use super::util::{
    desaturate, estimate_text_width_px, format_count, format_value, label_area_px, map_locale,
    padded_range, regime_color, regime_value_color,
};
use crate::models::{AggregatedCountryPoint, Regime};
use crate::stats::compute_extent;

const MARGIN: u32 = 16;
const TOOLTIP_FONT_PX: u32 = 13;

/// How to read the visual channels off an item.
pub struct ScatterAccessors<'a, T> {
    /// Identity reported by hit tests and matched against `hover`/`selected`.
    pub key: Box<dyn Fn(&T) -> String + 'a>,
    pub x: Box<dyn Fn(&T) -> f64 + 'a>,
    pub y: Box<dyn Fn(&T) -> f64 + 'a>,
    pub size: Box<dyn Fn(&T) -> f64 + 'a>,
    pub color: Box<dyn Fn(&T) -> RGBAColor + 'a>,
    /// Tooltip lines, first line is the heading.
    pub tooltip: Box<dyn Fn(&T) -> Vec<String> + 'a>,
}

/// Accessors for the country scatter view: size is the record count, color
/// the regime median.
pub fn country_accessors(locale_tag: &str) -> ScatterAccessors<'static, AggregatedCountryPoint> {
    let locale = map_locale(locale_tag);
    ScatterAccessors {
        key: Box::new(|p: &AggregatedCountryPoint| p.country.clone()),
        x: Box::new(|p: &AggregatedCountryPoint| p.x),
        y: Box::new(|p: &AggregatedCountryPoint| p.y),
        size: Box::new(|p: &AggregatedCountryPoint| p.record_count),
        color: Box::new(|p: &AggregatedCountryPoint| regime_value_color(p.regime_median)),
        tooltip: Box::new(move |p: &AggregatedCountryPoint| {
            let mut lines = vec![
                p.name.clone(),
                p.region.name().to_string(),
                if p.area.is_nan() {
                    "Area: n/a".to_string()
                } else {
                    format!("Area: {} km²", format_count(p.area, locale))
                },
                format!("Records: {}", format_count(p.raw_record_count as f64, locale)),
            ];
            if p.record_count != p.raw_record_count as f64 {
                lines.push(format!("Records per km²: {}", format_count(p.record_count, locale)));
            }
            lines
        }),
    }
}

/// Legend entries for the regime color channel.
pub fn regime_legend() -> Vec<LegendItem> {
    Regime::ALL
        .iter()
        .map(|r| LegendItem::new(r.label(), regime_color(*r), Swatch::Dot))
        .collect()
}

/// Pixel geometry of one drawn mark.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkHit {
    pub key: String,
    pub center: (i32, i32),
    pub radius: f64,
}

impl MarkHit {
    fn contains(&self, x: i32, y: i32) -> bool {
        let dx = (x - self.center.0) as f64;
        let dy = (y - self.center.1) as f64;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

/// Marks in draw order (last is topmost).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScatterLayout {
    pub marks: Vec<MarkHit>,
}

impl ScatterLayout {
    /// Topmost mark under the pixel `(x, y)`.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<&MarkHit> {
        self.marks.iter().rev().find(|m| m.contains(x, y))
    }

    /// Invoke `on_click` with the key of the mark under `(x, y)`, if any.
    /// Returns whether a mark was hit.
    pub fn click(&self, x: i32, y: i32, on_click: impl FnOnce(&str)) -> bool {
        match self.hit_test(x, y) {
            Some(mark) => {
                on_click(&mark.key);
                true
            }
            None => false,
        }
    }

    pub fn mark(&self, key: &str) -> Option<&MarkHit> {
        self.marks.iter().find(|m| m.key == key)
    }
}

/// Render to `out_path`; `.svg` selects the SVG backend, anything else PNG.
pub fn plot_scatter<T, P: AsRef<Path>>(
    items: &[T],
    acc: &ScatterAccessors<'_, T>,
    cfg: &ScatterConfig,
    out_path: P,
) -> Result<ScatterLayout> {
    ensure_fonts_registered();
    let out_path = out_path.as_ref();
    let path_string = out_path.to_string_lossy().to_string();
    let layout = if out_path.extension().and_then(|s| s.to_str()) == Some("svg") {
        let root = SVGBackend::new(path_string.as_str(), (cfg.width, cfg.height)).into_drawing_area();
        draw_scatter(&root, items, acc, cfg)?
    } else {
        let root =
            BitMapBackend::new(path_string.as_str(), (cfg.width, cfg.height)).into_drawing_area();
        draw_scatter(&root, items, acc, cfg)?
    };
    Ok(layout)
}

/// Fit an axis: forced bounds are kept, fitted ends get a little air so
/// edge marks are not cut in half.
fn axis_range<T>(items: &[T], f: impl Fn(&T) -> f64, bounds: (Option<f64>, Option<f64>)) -> (f64, f64) {
    let (lo_fit, hi_fit) = compute_extent(items, &f, None, None);
    let (lo_fit, hi_fit) = padded_range(lo_fit.unwrap_or(0.0), hi_fit.unwrap_or(1.0));
    let pad = (hi_fit - lo_fit) * 0.05;
    let lo = bounds.0.unwrap_or(lo_fit - pad);
    let hi = bounds.1.unwrap_or(hi_fit + pad);
    padded_range(lo, hi)
}

/// Draw onto any backend. Clears the area first: every call is a full redraw.
pub fn draw_scatter<DB: DrawingBackend, T>(
    root: &DrawingArea<DB, Shift>,
    items: &[T],
    acc: &ScatterAccessors<'_, T>,
    cfg: &ScatterConfig,
) -> Result<ScatterLayout> {
    root.fill(&WHITE).map_err(|e| anyhow!("{:?}", e))?;
    let (w, h) = root.dim_in_pixel();

    let (x0, x1) = axis_range(items, &*acc.x, cfg.x_bounds);
    let (y0, y1) = axis_range(items, &*acc.y, cfg.y_bounds);
    let y_labels: Vec<String> = [y0, y1].iter().map(|v| format_value(*v)).collect();
    let left_px = label_area_px(y_labels.iter().map(|s| s.as_str()), 12);

    let legend_h = estimate_legend_height_px(&cfg.legend, (MARGIN + left_px) as i32, w as i32);
    let (plot_area, legend_area) = root.split_vertically((h as i32 - legend_h).max(40));

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(MARGIN)
        .caption(cfg.title.trim(), (FontFamily::SansSerif, 22))
        .set_label_area_size(LabelAreaPosition::Left, left_px)
        .set_label_area_size(LabelAreaPosition::Bottom, 48)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(|e| anyhow!("{:?}", e))?;

    chart
        .configure_mesh()
        .x_desc(cfg.x_desc.as_str())
        .y_desc(cfg.y_desc.as_str())
        .x_label_formatter(&|v| format_value(*v))
        .y_label_formatter(&|v| format_value(*v))
        .label_style((FontFamily::SansSerif, 12))
        .axis_desc_style((FontFamily::SansSerif, 15))
        .light_line_style(&BLACK.mix(0.05))
        .draw()
        .map_err(|e| anyhow!("{:?}", e))?;

    let scale = LogScale::fit(items, &*acc.size, cfg.radius_px);
    let mut placed: Vec<(usize, MarkHit)> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let (x, y) = ((acc.x)(item), (acc.y)(item));
            if x.is_nan() || y.is_nan() {
                return None;
            }
            let radius = scale.map_or(cfg.radius_px.0, |s| s.map_or_min((acc.size)(item)));
            Some((
                i,
                MarkHit {
                    key: (acc.key)(item),
                    center: chart.backend_coord(&(x, y)),
                    radius,
                },
            ))
        })
        .collect();
    // Large marks first so small ones stay reachable on top.
    placed.sort_by(|a, b| b.1.radius.total_cmp(&a.1.radius));

    for (i, mark) in &placed {
        let color = (acc.color)(&items[*i]);
        let color = if cfg.loading { desaturate(color) } else { color };
        let r = mark.radius.round() as i32;
        plot_area
            .draw(&Circle::new(mark.center, r, color.mix(0.85).filled()))
            .map_err(|e| anyhow!("{:?}", e))?;
        plot_area
            .draw(&Circle::new(mark.center, r, WHITE.stroke_width(1)))
            .map_err(|e| anyhow!("{:?}", e))?;
        if cfg.selected.as_deref() == Some(mark.key.as_str()) {
            plot_area
                .draw(&Circle::new(mark.center, r + 3, BLACK.stroke_width(2)))
                .map_err(|e| anyhow!("{:?}", e))?;
        }
    }

    if let Some(hover) = cfg.hover.as_deref() {
        if let Some((i, mark)) = placed.iter().find(|(_, m)| m.key == hover) {
            draw_tooltip(&plot_area, mark, &(acc.tooltip)(&items[*i]))?;
        }
    }

    if !cfg.legend.is_empty() {
        draw_legend(&legend_area, &cfg.legend, (MARGIN + left_px) as i32)?;
    }
    root.present().map_err(|e| anyhow!("{:?}", e))?;

    Ok(ScatterLayout {
        marks: placed.into_iter().map(|(_, m)| m).collect(),
    })
}

/// Box of text lines next to `mark`, flipped to stay inside the area.
fn draw_tooltip<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    mark: &MarkHit,
    lines: &[String],
) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let (w, h) = area.dim_in_pixel();
    let line_h = TOOLTIP_FONT_PX as i32 + 4;
    let pad = 6;
    let box_w = lines
        .iter()
        .map(|l| estimate_text_width_px(l, TOOLTIP_FONT_PX) as i32)
        .max()
        .unwrap_or(0)
        + 2 * pad;
    let box_h = lines.len() as i32 * line_h + 2 * pad;
    let offset = mark.radius.ceil() as i32 + 6;

    let mut left = mark.center.0 + offset;
    if left + box_w > w as i32 {
        left = mark.center.0 - offset - box_w;
    }
    let mut top = mark.center.1 - offset - box_h;
    if top < 0 {
        top = mark.center.1 + offset;
    }
    let left = left.clamp(0, (w as i32 - box_w).max(0));
    let top = top.clamp(0, (h as i32 - box_h).max(0));

    area.draw(&Rectangle::new(
        [(left, top), (left + box_w, top + box_h)],
        RGBAColor(255, 255, 255, 0.95).filled(),
    ))
    .map_err(|e| anyhow!("{:?}", e))?;
    area.draw(&Rectangle::new(
        [(left, top), (left + box_w, top + box_h)],
        RGBColor(120, 120, 120).stroke_width(1),
    ))
    .map_err(|e| anyhow!("{:?}", e))?;

    let style = TextStyle::from((FontFamily::SansSerif, TOOLTIP_FONT_PX))
        .pos(Pos::new(HPos::Left, VPos::Top));
    for (i, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.clone(),
            (left + pad, top + pad + i as i32 * line_h),
            style.clone(),
        ))
        .map_err(|e| anyhow!("{:?}", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_test_prefers_topmost() {
        let layout = ScatterLayout {
            marks: vec![
                MarkHit {
                    key: "BIG".into(),
                    center: (100, 100),
                    radius: 15.0,
                },
                MarkHit {
                    key: "SMALL".into(),
                    center: (105, 100),
                    radius: 3.0,
                },
            ],
        };
        assert_eq!(layout.hit_test(105, 101).map(|m| m.key.as_str()), Some("SMALL"));
        assert_eq!(layout.hit_test(92, 100).map(|m| m.key.as_str()), Some("BIG"));
        assert!(layout.hit_test(300, 300).is_none());

        let mut clicked = None;
        assert!(layout.click(100, 110, |k| clicked = Some(k.to_string())));
        assert_eq!(clicked.as_deref(), Some("BIG"));
        assert!(!layout.click(0, 0, |_| unreachable!()));
    }

    #[test]
    fn forced_bounds_are_kept() {
        let v = [0.2, 0.4];
        assert_eq!(axis_range(&v, |x| *x, (Some(0.0), Some(1.0))), (0.0, 1.0));
        let (lo, hi) = axis_range(&v, |x| *x, (None, None));
        assert!(lo < 0.2 && hi > 0.4);
    }
}
