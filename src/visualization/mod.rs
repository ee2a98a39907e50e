// ============================================================
// Layer 7 — Visualization
// ============================================================
// PNG figures for judging a training run, drawn with plotters'
// bitmap backend:
//
//   prediction.rs — prediction vs. ground truth for one field
//   delta.rs      — ground truth minus prediction for p, ux, uy
//   loss.rs       — train/test loss curves on a log axis
//
// Every figure is sized in inches and rendered at 300 DPI, so
// a 15 x 5 in figure is a 4500 x 1500 px image. Font sizes are
// given in points and converted the same way.
//
// This module holds what the three figures share: unit
// conversion, tick placement, colormap lookup, heatmap cells
// and colorbars.
//
// Reference: plotters documentation (ChartBuilder, DrawingArea)

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::domain::config::ExperimentConfig;
use crate::domain::field::{Colormap, FlowField, Grid};

/// Prediction vs. ground truth heatmaps
pub mod prediction;

/// Error heatmaps for all three fields
pub mod delta;

/// Loss curves
pub mod loss;

pub use delta::plot_delta;
pub use loss::plot_loss;
pub use prediction::plot_prediction;

pub const DPI: f64 = 300.0;
pub const FONT: &str = "sans-serif";

pub(crate) type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

// ─── Units ────────────────────────────────────────────────────────────────────
/// Figure size in pixels for a size in inches.
pub fn figure_size(width_in: f64, height_in: f64) -> (u32, u32) {
    ((width_in * DPI).round() as u32, (height_in * DPI).round() as u32)
}

/// Typographic points to pixels.
pub fn points(pt: f64) -> f64 {
    pt * DPI / 72.0
}

pub(crate) fn px(pt: f64) -> i32 {
    points(pt).round() as i32
}

pub(crate) fn text_style(size_pt: f64) -> TextStyle<'static> {
    TextStyle::from((FONT, points(size_pt)))
}

// ─── Output files ─────────────────────────────────────────────────────────────
/// `<output_dir>/<file_name>`, creating the directory when needed.
pub fn output_path(cfg: &ExperimentConfig, file_name: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(&cfg.output_dir);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
    Ok(dir.join(file_name))
}

// ─── Ticks and ranges ─────────────────────────────────────────────────────────
/// `n` evenly spaced values from `min` to `max`, both included.
pub fn colorbar_ticks(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|k| min + k as f64 * step).collect()
        }
    }
}

/// Colour range of a field: its own min and max. A constant field
/// is widened by 5 % of its value (or 0.5 around zero) so it still
/// maps to a colour.
pub fn value_range(field: &FlowField) -> (f64, f64) {
    let (lo, hi) = field
        .min_max()
        .map(|(lo, hi)| (lo as f64, hi as f64))
        .unwrap_or((0.0, 0.0));
    if hi > lo {
        (lo, hi)
    } else {
        let pad = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
        (lo - pad, hi + pad)
    }
}

pub fn format_tick(v: f64) -> String {
    let a = v.abs();
    if a == 0.0 {
        "0".to_string()
    } else if !(1e-2..1e4).contains(&a) {
        format!("{v:.2e}")
    } else {
        format!("{v:.3}")
    }
}

// ─── Colormaps ────────────────────────────────────────────────────────────────
/// Colour for `t` in [0, 1] (clamped).
pub fn colormap_rgb(cmap: Colormap, t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    match cmap {
        Colormap::Viridis  => ViridisRGB::get_color(t),
        Colormap::Bone     => Bone::get_color(t),
        Colormap::Copper   => Copper::get_color(t),
        Colormap::Gray     => BlackWhite::get_color(t),
        Colormap::Coolwarm => DerivedColorMap::new(&[
            RGBColor(59, 76, 192),
            RGBColor(221, 221, 221),
            RGBColor(180, 4, 38),
        ])
        .get_color(t),
    }
}

fn normalize(v: f64, (lo, hi): (f64, f64)) -> f64 {
    (v - lo) / (hi - lo)
}

// ─── Heatmap ──────────────────────────────────────────────────────────────────
/// Pseudocolour plot of a single-channel `field` on `grid`. Each node
/// is a cell reaching halfway to its neighbours, clipped to the domain.
pub(crate) fn draw_heatmap(
    area:  &Area,
    field: &FlowField,
    grid:  &Grid,
    range: (f64, f64),
    cmap:  Colormap,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .margin(points(8.0))
        .x_label_area_size(points(22.0))
        .y_label_area_size(points(34.0))
        .build_cartesian_2d(grid.xmin..grid.xmax, grid.ymin..grid.ymax)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(6)
        .y_labels(5)
        .label_style(text_style(10.0))
        .draw()?;

    let grid = *grid;
    let (hx, hy) = (grid.dx() / 2.0, grid.dy() / 2.0);
    let cells = (0..grid.nx).flat_map(|i| (0..grid.ny).map(move |j| (i, j)));

    chart.draw_series(cells.map(|(i, j)| {
        let (x, y) = (grid.x(i), grid.y(j));
        let corners = [
            ((x - hx).max(grid.xmin), (y - hy).max(grid.ymin)),
            ((x + hx).min(grid.xmax), (y + hy).min(grid.ymax)),
        ];
        let t = normalize(field.get(0, i, j) as f64, range);
        Rectangle::new(corners, colormap_rgb(cmap, t).filled())
    }))?;

    Ok(())
}

// ─── Colorbars ────────────────────────────────────────────────────────────────
const COLORBAR_STEPS: i32 = 256;

/// Vertical colorbar filling `area`: gradient strip on the left,
/// tick labels to its right, rotated `label` at the far right.
pub(crate) fn draw_colorbar_vertical(
    area:  &Area,
    range: (f64, f64),
    ticks: usize,
    cmap:  Colormap,
    label: &str,
) -> Result<()> {
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);

    // Align with the heatmap's plotting box
    let top    = px(8.0);
    let bottom = h - px(8.0) - px(22.0);
    let left   = px(4.0);
    let right  = left + (w / 6).max(px(8.0));
    let span   = (bottom - top).max(1);

    for s in 0..COLORBAR_STEPS {
        let y0 = bottom - span * (s + 1) / COLORBAR_STEPS;
        let y1 = bottom - span * s / COLORBAR_STEPS;
        let t  = (s as f64 + 0.5) / COLORBAR_STEPS as f64;
        area.draw(&Rectangle::new([(left, y0), (right, y1)], colormap_rgb(cmap, t).filled()))?;
    }
    area.draw(&Rectangle::new([(left, top), (right, bottom)], BLACK.stroke_width(2)))?;

    let tick_style = text_style(9.0).pos(Pos::new(HPos::Left, VPos::Center));
    for value in colorbar_ticks(range.0, range.1, ticks) {
        let y = bottom - (normalize(value, range) * span as f64).round() as i32;
        area.draw(&PathElement::new(vec![(right, y), (right + px(3.0), y)], BLACK.stroke_width(2)))?;
        area.draw(&Text::new(format_tick(value), (right + px(5.0), y), tick_style.clone()))?;
    }

    let label_style = text_style(10.0)
        .transform(FontTransform::Rotate90)
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(label.to_string(), (w - px(8.0), (top + bottom) / 2), label_style))?;
    Ok(())
}

/// Horizontal colorbar filling `area`: gradient strip on top,
/// tick labels below it, `label` centred underneath.
pub(crate) fn draw_colorbar_horizontal(
    area:  &Area,
    range: (f64, f64),
    ticks: usize,
    cmap:  Colormap,
    label: &str,
) -> Result<()> {
    let (w, h) = area.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);

    let left   = px(8.0) + px(34.0);
    let right  = w - px(8.0);
    let top    = px(2.0);
    let bottom = top + (h / 4).max(px(6.0));
    let span   = (right - left).max(1);

    for s in 0..COLORBAR_STEPS {
        let x0 = left + span * s / COLORBAR_STEPS;
        let x1 = left + span * (s + 1) / COLORBAR_STEPS;
        let t  = (s as f64 + 0.5) / COLORBAR_STEPS as f64;
        area.draw(&Rectangle::new([(x0, top), (x1, bottom)], colormap_rgb(cmap, t).filled()))?;
    }
    area.draw(&Rectangle::new([(left, top), (right, bottom)], BLACK.stroke_width(2)))?;

    let tick_style = text_style(9.0).pos(Pos::new(HPos::Center, VPos::Top));
    for value in colorbar_ticks(range.0, range.1, ticks) {
        let x = left + (normalize(value, range) * span as f64).round() as i32;
        area.draw(&PathElement::new(vec![(x, bottom), (x, bottom + px(3.0))], BLACK.stroke_width(2)))?;
        area.draw(&Text::new(format_tick(value), (x, bottom + px(5.0)), tick_style.clone()))?;
    }

    let label_style = text_style(10.0).pos(Pos::new(HPos::Center, VPos::Bottom));
    area.draw(&Text::new(label.to_string(), ((left + right) / 2, h - px(2.0)), label_style))?;
    Ok(())
}
