//! Legend band drawn below the plot area.
//!
//! Items flow left to right starting at the plot's X-axis and wrap into
//! further rows when the band is full. The estimator and the painter share the
//! same constants and packing so the reserved band never clips.

use anyhow::{Result, anyhow};
use plotters::backend::DrawingBackend;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontFamily;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::types::{LegendItem, Swatch};
use super::util::estimate_text_width_px;

const FONT_PX: u32 = 14;
const LINE_H: i32 = FONT_PX as i32 + 2;
const ROW_GAP: i32 = 4;
const PAD_BAND: i32 = 8;
const SWATCH_W: i32 = 16;
const SWATCH_TO_TEXT: i32 = 8;
const TRAILING_GAP: i32 = 20;

fn block_width(label: &str) -> i32 {
    SWATCH_W + SWATCH_TO_TEXT + estimate_text_width_px(label, FONT_PX) as i32 + TRAILING_GAP
}

/// Greedy row packing: indices of the items on each row.
fn pack_rows(items: &[LegendItem], start_x: i32, total_w: i32) -> Vec<Vec<usize>> {
    let mut rows: Vec<Vec<usize>> = Vec::new();
    let mut cur = Vec::new();
    let mut x = start_x;
    for (i, item) in items.iter().enumerate() {
        let w = block_width(&item.label);
        if x + w > total_w && !cur.is_empty() {
            rows.push(std::mem::take(&mut cur));
            x = start_x;
        }
        x += w;
        cur.push(i);
    }
    if !cur.is_empty() {
        rows.push(cur);
    }
    rows
}

/// Height in pixels of the band needed for `items`; zero when there are none.
pub fn estimate_legend_height_px(items: &[LegendItem], start_x: i32, total_w: i32) -> i32 {
    if items.is_empty() {
        return 0;
    }
    let rows = pack_rows(items, start_x, total_w).len() as i32;
    PAD_BAND * 2 + rows * LINE_H + (rows - 1) * ROW_GAP
}

/// Paint the legend into `area`, whose width must be the canvas width passed
/// to [`estimate_legend_height_px`].
pub fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    items: &[LegendItem],
    start_x: i32,
) -> Result<()> {
    let (w, _) = area.dim_in_pixel();
    let label_style =
        TextStyle::from((FontFamily::SansSerif, FONT_PX)).pos(Pos::new(HPos::Left, VPos::Center));

    for (ri, row) in pack_rows(items, start_x, w as i32).iter().enumerate() {
        let cy = PAD_BAND + ri as i32 * (LINE_H + ROW_GAP) + LINE_H / 2;
        let mut x = start_x;
        for &i in row {
            let item = &items[i];
            draw_swatch(area, item, x, cy)?;
            area.draw(&Text::new(
                item.label.clone(),
                (x + SWATCH_W + SWATCH_TO_TEXT, cy),
                label_style.clone(),
            ))
            .map_err(|e| anyhow!("{:?}", e))?;
            x += block_width(&item.label);
        }
    }
    Ok(())
}

fn draw_swatch<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    item: &LegendItem,
    x: i32,
    cy: i32,
) -> Result<()> {
    let fill = item.color.filled();
    match item.swatch {
        Swatch::Dot => area
            .draw(&Circle::new((x + SWATCH_W / 2, cy), 5, fill))
            .map_err(|e| anyhow!("{:?}", e)),
        Swatch::Bar => area
            .draw(&Rectangle::new([(x + 2, cy - 6), (x + SWATCH_W - 2, cy + 6)], fill))
            .map_err(|e| anyhow!("{:?}", e)),
        Swatch::Line => {
            area.draw(&PathElement::new(
                vec![(x, cy), (x + SWATCH_W, cy)],
                item.color.stroke_width(2),
            ))
            .map_err(|e| anyhow!("{:?}", e))?;
            area.draw(&Circle::new((x + SWATCH_W / 2, cy), 3, fill))
                .map_err(|e| anyhow!("{:?}", e))
        }
        Swatch::Flag => area
            .draw(&Polygon::new(
                vec![(x + 2, cy + 6), (x + SWATCH_W - 2, cy + 6), (x + SWATCH_W / 2, cy - 6)],
                fill,
            ))
            .map_err(|e| anyhow!("{:?}", e)),
    }
}
