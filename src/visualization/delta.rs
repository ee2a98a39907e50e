use std::path::PathBuf;

use anyhow::{ensure, Result};
use plotters::prelude::*;

use crate::domain::config::ExperimentConfig;
use crate::domain::field::{Colormap, FieldName, FlowField, Grid};
use crate::visualization::{
    draw_colorbar_horizontal, draw_heatmap, figure_size, output_path, points, value_range,
};

const COLORBAR_TICKS: usize = 5;

/// Error heatmaps `ground_truth - predictions` for p, ux and uy, drawn
/// in a row with `cmap` and written to `vit_delta_{epoch}.png`.
///
/// Inputs are full multi-channel fields; channels 0, 1 and 2 are used.
pub fn plot_delta(
    cfg:          &ExperimentConfig,
    predictions:  &FlowField,
    ground_truth: &FlowField,
    epoch:        usize,
    cmap:         Colormap,
) -> Result<PathBuf> {
    ensure!(
        predictions.shape() == ground_truth.shape(),
        "Prediction shape {:?} does not match ground truth shape {:?}",
        predictions.shape(),
        ground_truth.shape()
    );
    ensure!(
        predictions.channels >= FieldName::ALL.len(),
        "plot_delta needs p, ux and uy channels, got {}",
        predictions.channels
    );

    let grid = Grid::from_config(cfg);
    ensure!(
        [predictions.nx, predictions.ny] == [grid.nx, grid.ny],
        "Field is {}x{} but the grid is {}x{}",
        predictions.nx,
        predictions.ny,
        grid.nx,
        grid.ny
    );
    let panels = delta_panels(predictions, ground_truth)?;

    let path = output_path(cfg, &format!("vit_delta_{epoch}.png"))?;
    {
        let (width, height) = figure_size(15.0, 6.0);
        let root = BitMapBackend::new(&path, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        // Colorbars take the bottom band, matching a 1 : 0.05 height ratio
        // plus room for tick labels and the axis label.
        let bar_height = points(64.0).round() as u32;
        let (plots, bars) = root.split_vertically(height.saturating_sub(bar_height));
        let plot_areas = plots.split_evenly((1, 3));
        let bar_areas  = bars.split_evenly((1, 3));

        for ((field, label), (plot, bar)) in panels.iter().zip(plot_areas.iter().zip(&bar_areas)) {
            let range = value_range(field);
            draw_heatmap(plot, field, &grid, range, cmap)?;
            draw_colorbar_horizontal(bar, range, COLORBAR_TICKS, cmap, label)?;
        }

        root.present()?;
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(path)
}

/// One `ground_truth - predictions` field per flow quantity, with its
/// colorbar label.
fn delta_panels(predictions: &FlowField, ground_truth: &FlowField) -> Result<Vec<(FlowField, String)>> {
    let delta = ground_truth.difference(predictions)?;
    FieldName::ALL
        .iter()
        .map(|f| -> Result<(FlowField, String)> {
            Ok((delta.channel(f.channel())?, format!("Δ{f} [-]")))
        })
        .collect()
}
