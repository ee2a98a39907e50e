// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Plain epoch loop around the ViT regressor:
//
//   for each epoch
//     ├─ steps_per_epoch batches from ONE repeated train stream
//     │    forward (dropout on) → MSE → backward → AdamW step
//     ├─ fresh stream over the in-memory "test" split, model.valid(), dropout off
//     ├─ summary line + metrics.csv row + checkpoint
//     └─ every `plot_every` epochs: prediction and delta figures
//   after the last epoch: loss curves
//
// Key Burn 0.20 insight:
//   - Training runs on Autodiff<NdArray> or Autodiff<Wgpu>,
//     picked from `device` in the config
//   - model.valid() returns the model on the inner backend, so
//     the evaluation stream is built for that backend too
//   - Both backends share the same Device type
//
// Only process 0 writes checkpoints, metrics and figures.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use std::path::PathBuf;

use anyhow::{anyhow, ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::pipeline::{build_stream, get_data, preload_split, LoadedSplit, TRAIN_SPLIT};
use crate::domain::config::{DeviceKind, ExperimentConfig};
use crate::domain::field::{FieldName, FlowField};
use crate::domain::topology::ProcessTopology;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{VitRegressor, VitRegressorConfig};
use crate::ml::schedule::LrSchedule;
use crate::visualization::{plot_delta, plot_loss, plot_prediction};

pub const TEST_SPLIT: &str = "test";

type CpuBackend = Autodiff<NdArray>;
type GpuBackend = Autodiff<Wgpu>;

/// Loss history of a finished run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub train_loss: Vec<f64>,
    pub test_loss:  Vec<f64>,
    /// `vit_loss.png`, written by process 0 only
    pub loss_plot:  Option<PathBuf>,
}

/// Initialise the configured device and train on it.
pub fn run_training(
    cfg:         &ExperimentConfig,
    topology:    &ProcessTopology,
    checkpoints: &CheckpointManager,
) -> Result<TrainingReport> {
    match cfg.device {
        DeviceKind::Cpu => {
            let device = NdArrayDevice::default();
            tracing::info!("Using NdArray CPU device: {:?}", device);
            train_loop::<CpuBackend>(cfg, topology, checkpoints, device)
        }
        DeviceKind::Gpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<GpuBackend>(cfg, topology, checkpoints, device)
        }
    }
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:         &ExperimentConfig,
    topology:    &ProcessTopology,
    checkpoints: &CheckpointManager,
    device:      B::Device,
) -> Result<TrainingReport> {
    B::seed(&device, cfg.seed);
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let primary = topology.is_primary();

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = VitRegressorConfig::from_experiment(cfg);
    let mut model: VitRegressor<B> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: {} layers, dim_model={}, {} patches of {}x{}",
        model_cfg.num_layers,
        model_cfg.dim_model,
        model_cfg.num_patches(),
        model_cfg.patch_size,
        model_cfg.patch_size,
    );

    // ── AdamW optimiser ───────────────────────────────────────────────────────
    let mut optim = AdamWConfig::new()
        .with_weight_decay(cfg.weight_decay as f32)
        .init();

    // ── One repeated stream for the whole run ─────────────────────────────────
    let mut train_stream = get_data::<B>(cfg, TRAIN_SPLIT, topology, &device)?;
    let test_split       = preload_split(cfg, TEST_SPLIT)?;
    let steps_per_epoch  = train_stream.len() / cfg.num_epochs;
    ensure!(
        steps_per_epoch > 0,
        "Training shard on {topology} is smaller than one batch of {}",
        cfg.batch_size
    );

    let mut schedule = LrSchedule::build(
        cfg.learning_rate_scheduler,
        cfg.learning_rate,
        steps_per_epoch * cfg.num_epochs,
    )?;

    let metrics = if primary { Some(MetricsLogger::new(checkpoints.dir())?) } else { None };
    if let Some(logger) = &metrics {
        tracing::info!("Logging epoch metrics to '{}'", logger.csv_path().display());
    }
    let mut best_test_loss = f64::INFINITY;
    let mut train_history = Vec::with_capacity(cfg.num_epochs);
    let mut test_history  = Vec::with_capacity(cfg.num_epochs);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.num_epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;
        let mut lr             = cfg.learning_rate;

        for batch in train_stream.by_ref().take(steps_per_epoch) {
            let (loss, _) = model.forward_loss(batch, false, &mut rng);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            lr    = schedule.step();
            model = optim.step(lr, model, grads);
        }
        ensure!(
            train_batches == steps_per_epoch,
            "Train stream ended early in epoch {epoch} ({train_batches}/{steps_per_epoch} batches)"
        );
        let train_loss = train_loss_sum / train_batches as f64;

        // ── Evaluation phase ──────────────────────────────────────────────────
        let plot_now = primary && cfg.plot_every > 0 && epoch % cfg.plot_every == 0;
        let eval     = evaluate(&model.valid(), &test_split, cfg, topology, &device, plot_now, &mut rng)?;

        println!(
            "Epoch {:>3}/{} | train_loss={:.6} | test_loss={:.6} | lr={:.3e}",
            epoch, cfg.num_epochs, train_loss, eval.loss, lr,
        );

        train_history.push(train_loss);
        test_history.push(eval.loss);

        let row = EpochMetrics::new(epoch, train_loss, eval.loss, lr);
        if row.is_improvement(best_test_loss) {
            best_test_loss = row.test_loss;
            tracing::info!("New best test loss {:.6} at epoch {}", best_test_loss, epoch);
        }

        if primary {
            if let Some(logger) = &metrics {
                logger.log(&row)?;
            }
            checkpoints.save_model(&model, epoch)?;
            tracing::info!("Checkpoint saved for epoch {}", epoch);
        }

        if let Some((predictions, ground_truth)) = eval.first_sample {
            for field in FieldName::ALL {
                plot_prediction(
                    cfg,
                    &predictions.channel(field.channel())?,
                    &ground_truth.channel(field.channel())?,
                    epoch,
                    field.channel(),
                )?;
            }
            plot_delta(cfg, &predictions, &ground_truth, epoch, cfg.cmap)?;
            tracing::info!("Prediction figures written for epoch {}", epoch);
        }
    }

    let loss_plot = if primary {
        Some(plot_loss(cfg, &train_history, &test_history)?)
    } else {
        None
    };

    tracing::info!("Training complete!");
    Ok(TrainingReport { train_loss: train_history, test_loss: test_history, loss_plot })
}

// ─── Evaluation ───────────────────────────────────────────────────────────────
struct Evaluation {
    loss:         f64,
    /// (prediction, ground truth) of the first test example
    first_sample: Option<(FlowField, FlowField)>,
}

fn evaluate<B: Backend, R: Rng + ?Sized>(
    model:       &VitRegressor<B>,
    test_split:  &LoadedSplit,
    cfg:         &ExperimentConfig,
    topology:    &ProcessTopology,
    device:      &B::Device,
    keep_sample: bool,
    rng:         &mut R,
) -> Result<Evaluation> {
    let mut loss_sum     = 0.0f64;
    let mut batches      = 0usize;
    let mut first_sample = None;

    for batch in build_stream::<B, _>(test_split, cfg, test_split.name(), topology, device)? {
        let targets = batch.targets.clone();
        let (loss, predictions) = model.forward_loss(batch, true, rng);

        loss_sum += loss.into_scalar().elem::<f64>();
        batches  += 1;

        if keep_sample && first_sample.is_none() {
            first_sample = Some((first_example(predictions)?, first_example(targets)?));
        }
    }

    if batches == 0 {
        tracing::warn!("Test split yielded no full batch on {topology}; test loss is NaN");
    }
    let loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
    Ok(Evaluation { loss, first_sample })
}

/// Copy example 0 of a `[batch, c, nx, ny]` tensor to the host.
fn first_example<B: Backend>(tensor: Tensor<B, 4>) -> Result<FlowField> {
    let [_, c, nx, ny] = tensor.dims();
    let values = tensor
        .slice([0..1, 0..c, 0..nx, 0..ny])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))?;
    FlowField::new(c, nx, ny, values)
}
