//! Public configuration types for the two renderers.

use plotters::style::RGBAColor;

/// Pixel interval of scatter mark radii.
pub const DEFAULT_RADIUS_PX: (f64, f64) = (3.0, 15.0);

/// Swatch drawn next to a legend label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swatch {
    /// Filled circle (scatter marks, line points).
    Dot,
    /// Filled square (bars).
    Bar,
    /// Short horizontal stroke with a point (indicator line).
    Line,
    /// Small filled triangle (conflict band).
    Flag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendItem {
    pub label: String,
    pub color: RGBAColor,
    pub swatch: Swatch,
}

impl LegendItem {
    pub fn new(label: impl Into<String>, color: RGBAColor, swatch: Swatch) -> Self {
        Self {
            label: label.into(),
            color,
            swatch,
        }
    }
}

/// Scatter renderer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    /// Forced axis bounds; `None` fits the data.
    pub x_bounds: (Option<f64>, Option<f64>),
    pub y_bounds: (Option<f64>, Option<f64>),
    /// Smallest and largest mark radius in pixels.
    pub radius_px: (f64, f64),
    /// A fetch is in flight: draw the same marks, desaturated.
    pub loading: bool,
    /// Key of the mark whose tooltip is shown.
    pub hover: Option<String>,
    /// Key of the mark drawn with a selection ring.
    pub selected: Option<String>,
    pub legend: Vec<LegendItem>,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 700,
            title: String::new(),
            x_desc: "x".into(),
            y_desc: "y".into(),
            x_bounds: (None, None),
            y_bounds: (None, None),
            radius_px: DEFAULT_RADIUS_PX,
            loading: false,
            hover: None,
            selected: None,
            legend: Vec::new(),
        }
    }
}

/// Dual-axis time renderer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Axis and legend label of the indicator line.
    pub indicator_desc: String,
    /// Forced bounds of the indicator axis; `None` fits the data.
    pub value_bounds: (Option<f64>, Option<f64>),
    pub loading: bool,
    pub locale: String,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            title: String::new(),
            indicator_desc: "Indicator".into(),
            value_bounds: (None, None),
            loading: false,
            locale: "en".into(),
        }
    }
}
