// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves model weights and the experiment configuration using
// Burn's CompactRecorder and serde_json.
//
// What gets saved:
//   1. Model weights (.mpk file) after every epoch
//   2. latest_epoch.json       — which epoch was last saved
//   3. experiment.json         — the full experiment config,
//                                written once before training
//
// The config is what rebuilds the architecture later: weights
// alone cannot be loaded without knowing img_size, patch_size,
// dim_model and friends.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk
//     model_epoch_2.mpk
//     ...
//     latest_epoch.json
//     experiment.json
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::domain::config::ExperimentConfig;
use crate::ml::model::VitRegressor;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const EXPERIMENT_FILE:   &str = "experiment.json";

/// Manages checkpoint files inside one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager and its directory (like `mkdir -p`).
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{dir}/model_epoch_{epoch}.mpk` and bump latest_epoch.json.
    pub fn save_model<B: Backend>(&self, model: &VitRegressor<B>, epoch: usize) -> Result<PathBuf> {
        // Recorder appends the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let latest_path = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(path.with_extension("mpk"))
    }

    /// Save the experiment configuration to JSON.
    pub fn save_config(&self, cfg: &ExperimentConfig) -> Result<()> {
        let path = self.dir.join(EXPERIMENT_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved experiment config to '{}'", path.display());
        Ok(())
    }

    /// Load the experiment configuration saved by `save_config`.
    pub fn load_config(&self) -> Result<ExperimentConfig> {
        let path = self.dir.join(EXPERIMENT_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. Has training been run?",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    /// Epoch number of the most recent checkpoint.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_EPOCH_FILE);

        let s = fs::read_to_string(&path)
            .with_context(|| {
                format!("Cannot find '{}'. Has training been run?", path.display())
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
