// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Prepare the checkpoint directory   (Layer 6 - infra)
//   Step 2: Save the config next to the models (Layer 6 - infra)
//   Step 3: Run the training loop              (Layer 5 - ml)
//
// Dataset streaming, evaluation and figures all happen inside
// the training loop; this layer only decides what runs where.
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;

use crate::domain::config::ExperimentConfig;
use crate::domain::topology::ProcessTopology;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::{run_training, TrainingReport};

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:   ExperimentConfig,
    topology: ProcessTopology,
}

impl TrainUseCase {
    pub fn new(config: ExperimentConfig, topology: ProcessTopology) -> Self {
        Self { config, topology }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingReport> {
        let cfg = &self.config;

        // ── Step 1: Checkpoint directory ──────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;

        // ── Step 2: Save config (process 0 only) ──────────────────────────────
        // Every process reads the same file, so one copy is enough.
        if self.topology.is_primary() {
            warn_on_previous_run(&ckpt_manager, cfg);
            ckpt_manager.save_config(cfg)?;
        }

        // ── Step 3: Training loop (Layer 5) ───────────────────────────────────
        let report = run_training(cfg, &self.topology, &ckpt_manager)?;
        tracing::info!(
            "Finished {} epochs on {}",
            report.train_loss.len(),
            self.topology
        );
        Ok(report)
    }
}

/// A previous run in the same directory is overwritten, not resumed.
fn warn_on_previous_run(ckpt_manager: &CheckpointManager, cfg: &ExperimentConfig) {
    let Ok(epoch) = ckpt_manager.latest_epoch() else {
        return;
    };
    tracing::warn!(
        "'{}' already holds checkpoints up to epoch {}; they will be overwritten",
        ckpt_manager.dir().display(),
        epoch
    );
    if let Ok(previous) = ckpt_manager.load_config() {
        if previous != *cfg {
            tracing::warn!("The previous run used a different configuration");
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::write_fixture;
    use crate::domain::config::DeviceKind;

    fn tiny_config(root: &std::path::Path) -> ExperimentConfig {
        let mut cfg = ExperimentConfig {
            dataset:        root.join("data").to_string_lossy().into_owned(),
            output_dir:     root.join("figures").to_string_lossy().into_owned(),
            checkpoint_dir: root.join("ckpt").to_string_lossy().into_owned(),
            device:         DeviceKind::Cpu,
            batch_size:     2,
            num_epochs:     1,
            plot_every:     0,
            ..Default::default()
        };
        cfg.vit.img_size   = [8, 8];
        cfg.vit.patch_size = 4;
        cfg.vit.num_layers = 1;
        cfg.vit.num_heads  = 2;
        cfg.vit.dim_model  = 8;
        cfg.vit.dim_mlp    = 16;
        cfg
    }

    #[test]
    fn test_execute_saves_config_and_reports_losses() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        write_fixture(std::path::Path::new(&cfg.dataset), &cfg, 4, 2).unwrap();

        let report = TrainUseCase::new(cfg.clone(), ProcessTopology::single())
            .execute()
            .unwrap();

        assert_eq!(report.train_loss.len(), 1);
        assert_eq!(report.test_loss.len(), 1);

        let saved = CheckpointManager::new(&cfg.checkpoint_dir).unwrap().load_config().unwrap();
        assert_eq!(saved, cfg);
    }

    #[test]
    fn test_second_run_overwrites_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        write_fixture(std::path::Path::new(&cfg.dataset), &cfg, 4, 2).unwrap();

        TrainUseCase::new(cfg.clone(), ProcessTopology::single()).execute().unwrap();
        cfg.learning_rate = 5e-4;
        TrainUseCase::new(cfg.clone(), ProcessTopology::single()).execute().unwrap();

        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        assert_eq!(ckpt.load_config().unwrap().learning_rate, 5e-4);
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);
    }

    #[test]
    fn test_missing_dataset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        assert!(TrainUseCase::new(cfg, ProcessTopology::single()).execute().is_err());
    }
}
