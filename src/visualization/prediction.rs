use std::path::PathBuf;

use anyhow::{ensure, Result};
use plotters::prelude::*;

use crate::domain::config::ExperimentConfig;
use crate::domain::field::{Colormap, FieldName, FlowField, Grid};
use crate::visualization::{
    draw_colorbar_vertical, draw_heatmap, figure_size, output_path, points, value_range,
};

const COLORBAR_TICKS: usize = 10;

/// Side-by-side heatmaps of a predicted field and its ground truth,
/// each scaled to its own range, written to `vit_{field}_{epoch}.png`.
///
/// `name` selects the field: 0 = p, 1 = ux, 2 = uy. Both inputs are
/// single-channel fields of the configured grid size.
pub fn plot_prediction(
    cfg:          &ExperimentConfig,
    predictions:  &FlowField,
    ground_truth: &FlowField,
    epoch:        usize,
    name:         usize,
) -> Result<PathBuf> {
    let field = FieldName::from_index(name)?;
    ensure!(
        predictions.shape() == ground_truth.shape(),
        "Prediction shape {:?} does not match ground truth shape {:?}",
        predictions.shape(),
        ground_truth.shape()
    );
    ensure!(
        predictions.channels == 1,
        "plot_prediction expects a single field, got {} channels",
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

    let path = output_path(cfg, &format!("vit_{field}_{epoch}.png"))?;
    {
        let root = BitMapBackend::new(&path, figure_size(15.0, 5.0)).into_drawing_area();
        root.fill(&WHITE)?;

        let panels = root.split_evenly((1, 2));
        for (panel, (data, label)) in panels
            .iter()
            .zip([(predictions, "Predictions"), (ground_truth, "Ground truth")])
        {
            let (width, _) = panel.dim_in_pixel();
            let bar_width  = points(58.0).round() as u32;
            let (plot, bar) = panel.split_horizontally(width.saturating_sub(bar_width));

            let range = value_range(data);
            draw_heatmap(&plot, data, &grid, range, Colormap::Viridis)?;
            draw_colorbar_vertical(&bar, range, COLORBAR_TICKS, Colormap::Viridis, label)?;
        }

        root.present()?;
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(path)
}
