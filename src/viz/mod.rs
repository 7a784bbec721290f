//! Rendering of the two aggregate views to **SVG** or **PNG**.
//!
//! - [`scatter`]: one mark per country, sized by record count (log scale),
//!   colored by regime, with hit testing for hover and click
//! - [`timeline`]: record-count bars on a log axis with the selected
//!   indicator on a second linear axis and a conflict band
//!
//! Both renderers clear and redraw the whole surface on every call. Layers go
//! background, axes and labels, data marks, tooltip; legends sit in a band
//! under the plot.

pub mod legend;
pub mod scales;
pub mod scatter;
pub mod timeline;
pub mod types;
pub mod util;

pub use scatter::{
    MarkHit, ScatterAccessors, ScatterLayout, country_accessors, draw_scatter, plot_scatter,
    regime_legend,
};
pub use timeline::{draw_timeline, plot_timeline};
pub use types::{LegendItem, ScatterConfig, Swatch, TimelineConfig};

use std::sync::Once;

/// One-time registration for a fallback "sans-serif" font when using the `ab_glyph` text path.
/// Required because `ab_glyph` doesn't discover OS fonts.
static INIT_FONTS: Once = Once::new();

pub(crate) fn ensure_fonts_registered() {
    INIT_FONTS.call_once(|| {
        let _ = plotters::style::register_font(
            "sans-serif",
            plotters::style::FontStyle::Normal,
            include_bytes!("../../assets/DejaVuSans.ttf"),
        );
    });
}
