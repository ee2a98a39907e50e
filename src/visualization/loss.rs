use std::path::PathBuf;

use anyhow::{ensure, Result};
use plotters::prelude::*;

use crate::domain::config::ExperimentConfig;
use crate::visualization::{figure_size, format_tick, output_path, points, text_style};

const TRAIN_COLOR: RGBColor = RGBColor(31, 119, 180);
const TEST_COLOR:  RGBColor = RGBColor(255, 127, 14);
const MAJOR_GRID:  RGBColor = RGBColor(0x44, 0x44, 0x44);
const MINOR_GRID:  RGBColor = RGBColor(0xcc, 0xcc, 0xcc);

/// Train and test loss per epoch on a logarithmic axis, written to
/// `vit_loss.png` (overwritten on every call).
///
/// Both series must hold one value per epoch. Non-positive values
/// cannot be shown on a log axis and are skipped.
pub fn plot_loss(cfg: &ExperimentConfig, train_loss: &[f64], test_loss: &[f64]) -> Result<PathBuf> {
    let epochs = cfg.num_epochs;
    ensure!(
        train_loss.len() == epochs && test_loss.len() == epochs,
        "Expected {epochs} loss values per series, got {} train / {} test",
        train_loss.len(),
        test_loss.len()
    );

    let positive = |v: &&f64| v.is_finite() && **v > 0.0;
    let (lo, hi) = train_loss
        .iter()
        .chain(test_loss)
        .filter(positive)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    // Pad by a factor so curves do not touch the frame; fall back to a
    // decade around 1 when nothing is plottable.
    let (lo, hi) = if lo.is_finite() { (lo / 1.5, hi * 1.5) } else { (0.1, 10.0) };

    let title = format!(
        "Epochs = {}, Batch size = {}, Lr = {}, Weight decay = {}",
        cfg.num_epochs, cfg.batch_size, cfg.learning_rate_scheduler, cfg.weight_decay
    );

    let path = output_path(cfg, "vit_loss.png")?;
    {
        let root = BitMapBackend::new(&path, figure_size(5.0, 5.0)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, text_style(8.0))
            .margin(points(8.0))
            .x_label_area_size(points(30.0))
            .y_label_area_size(points(46.0))
            .build_cartesian_2d(0f64..epochs as f64, (lo..hi).log_scale())?;

        chart
            .configure_mesh()
            .bold_line_style(MAJOR_GRID.stroke_width(1))
            .light_line_style(MINOR_GRID.stroke_width(1))
            .x_desc("Epochs")
            .y_desc("Mean Square Error")
            .y_label_formatter(&|v| format_tick(*v))
            .label_style(text_style(9.0))
            .axis_desc_style(text_style(10.0))
            .draw()?;

        for (series, label, color) in [
            (train_loss, "Train", TRAIN_COLOR),
            (test_loss,  "Test",  TEST_COLOR),
        ] {
            let points_iter = series
                .iter()
                .enumerate()
                .filter(|(_, v)| positive(v))
                .map(|(epoch, &v)| (epoch as f64, v));

            chart
                .draw_series(LineSeries::new(points_iter, color.stroke_width(3)))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 40, y)], color.stroke_width(3)));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(text_style(9.0))
            .draw()?;

        root.present()?;
    }

    tracing::debug!("Wrote {}", path.display());
    Ok(path)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path, epochs: usize) -> ExperimentConfig {
        ExperimentConfig {
            num_epochs: epochs,
            output_dir: dir.to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_three_epochs_write_loss_png() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = config(dir.path(), 3);
        let path = plot_loss(&cfg, &[1.0, 0.5, 0.25], &[1.2, 0.6, 0.4]).unwrap();
        assert_eq!(path, dir.path().join("vit_loss.png"));
        assert!(path.exists());
    }

    #[test]
    fn test_second_call_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 2);
        plot_loss(&cfg, &[1.0, 0.5], &[1.0, 0.5]).unwrap();
        plot_loss(&cfg, &[2.0, 0.1], &[2.0, 0.1]).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_length_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 3);
        assert!(plot_loss(&cfg, &[1.0, 0.5], &[1.0, 0.5, 0.2]).is_err());
    }

    #[test]
    fn test_non_positive_losses_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 3);
        assert!(plot_loss(&cfg, &[0.0, 0.5, f64::NAN], &[0.0, 0.0, 0.0]).is_ok());
    }
}
