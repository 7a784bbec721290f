//! Utility functions for visualization: colors, locale mapping, label sizing.

use crate::models::Regime;
use num_format::{Locale, ToFormattedString};
use plotters::prelude::*;

/// Microsoft Office (2013+) chart series palette, first entries.
pub const BAR_BLUE: RGBColor = RGBColor(91, 155, 213);
pub const LINE_ORANGE: RGBColor = RGBColor(237, 125, 49);
pub const CONFLICT_RED: RGBColor = RGBColor(192, 0, 0);
const LOADING_GRAY: RGBColor = RGBColor(175, 175, 175);

/// Regime colors, from closed autocracy to liberal democracy.
const REGIME_COLORS: [RGBColor; 4] = [
    RGBColor(158, 72, 14),   // dark orange
    RGBColor(255, 192, 0),   // gold
    RGBColor(91, 155, 213),  // light blue
    RGBColor(38, 68, 120),   // dark blue
];

pub fn regime_color(regime: Regime) -> RGBAColor {
    REGIME_COLORS[regime as usize].to_rgba()
}

/// Color for a regime median; unclassifiable values are gray.
pub fn regime_value_color(value: f64) -> RGBAColor {
    Regime::from_value(value).map_or(LOADING_GRAY.to_rgba(), regime_color)
}

/// Washed-out version of `c`, used while data is being refetched.
pub fn desaturate(c: RGBAColor) -> RGBAColor {
    let RGBAColor(r, g, b, a) = c;
    let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    let mix = |v: u8| ((v as f64 * 0.15) + (luma * 0.45) + (255.0 * 0.40)).round() as u8;
    RGBAColor(mix(r), mix(g), mix(b), a * 0.8)
}

/// Map a user-provided locale tag to a `num_format::Locale`.
///
/// Supported tags (case-insensitive): `en`, `de`, `fr`, `es`, `it`, `pt`, `nl`, `sv`.
/// Defaults to English.
pub fn map_locale(tag: &str) -> &'static Locale {
    match tag.to_lowercase().as_str() {
        "de" | "de_de" | "german" => &Locale::de,
        "fr" | "fr_fr" => &Locale::fr,
        "es" | "es_es" => &Locale::es,
        "it" | "it_it" => &Locale::it,
        "pt" | "pt_pt" | "pt_br" => &Locale::pt,
        "nl" | "nl_nl" => &Locale::nl,
        "sv" | "sv_se" | "swedish" => &Locale::sv,
        _ => &Locale::en, // default
    }
}

/// Whole-number label with locale thousands separators; small fractions keep
/// two decimals (normalized counts can drop below one).
pub fn format_count(v: f64, locale: &Locale) -> String {
    if v.abs() >= 1.0 || v == 0.0 {
        (v.round() as i64).to_formatted_string(locale)
    } else {
        format!("{:.2}", v)
    }
}

/// Label for a value in a 0..1 or 0..3 indicator range.
pub fn format_value(v: f64) -> String {
    let a = v.abs();
    let prec = if a >= 100.0 {
        0
    } else if a >= 10.0 {
        1
    } else {
        2
    };
    format!("{:.*}", prec, v)
}

/// Heuristic: estimate pixel width of text (Plotters has no built-in text measuring).
pub fn estimate_text_width_px(text: &str, font_px: u32) -> u32 {
    ((text.chars().count() as f32) * (font_px as f32) * 0.60).ceil() as u32
}

/// Width of a Y label area that fits the widest of `labels`, clamped.
pub fn label_area_px<'a>(labels: impl IntoIterator<Item = &'a str>, font_px: u32) -> u32 {
    let max_px = labels
        .into_iter()
        .map(|s| estimate_text_width_px(s, font_px))
        .max()
        .unwrap_or(0);
    max_px.saturating_add(18).clamp(48, 140)
}

/// Widen a degenerate `(lo, hi)` range so it can back an axis.
pub fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_use_locale_separators() {
        assert_eq!(format_count(30000.0, map_locale("en")), "30,000");
        assert_eq!(format_count(30000.0, map_locale("de")), "30.000");
        assert_eq!(format_count(0.25, map_locale("en")), "0.25");
    }

    #[test]
    fn desaturated_colors_are_lighter() {
        let c = desaturate(RGBAColor(38, 68, 120, 1.0));
        assert!(c.0 > 38 && c.1 > 68);
        assert!(c.3 < 1.0);
    }
}
