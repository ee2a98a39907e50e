// ============================================================
// Layer 3 — Experiment Configuration
// ============================================================
// Everything one training run needs, read once from the JSON
// file passed with `--config` and never mutated afterwards.
//
// Layout of the file:
//
//   {
//     "trainer": "train",
//     "dataset": "data/airfoil",
//     "batch_size": 16,
//     "num_epochs": 100,
//     "learning_rate": 1e-3,
//     "learning_rate_scheduler": "cosine",
//     "weight_decay": 1e-4,
//     "preprocess": { "dim": [-0.75, 1.25, -0.5, 0.5] },
//     "vit": { "img_size": [64, 64], "patch_size": 8, ... }
//   }
//
// Every section has defaults, so a file only needs the keys
// that differ from them.
//
// Reference: serde documentation (#[serde(default)])

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::field::Colormap;

// ─── Trainer ──────────────────────────────────────────────────────────────────
/// What the binary should do with the configuration.
///
/// Kept as a raw string in the file and parsed at dispatch time,
/// so an unknown value is reported as a usage error by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trainer {
    Train,
    Inference,
}

impl FromStr for Trainer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train"     => Ok(Trainer::Train),
            "inference" => Ok(Trainer::Inference),
            other       => bail!("Unknown trainer: {other}"),
        }
    }
}

// ─── Device selection ─────────────────────────────────────────────────────────
/// Which device the numerical backend is initialised on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    #[default]
    Gpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Gpu => write!(f, "gpu"),
        }
    }
}

// ─── Learning-rate schedule ──────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningRateScheduler {
    Constant,
    #[default]
    Cosine,
}

impl fmt::Display for LearningRateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningRateScheduler::Constant => write!(f, "constant"),
            LearningRateScheduler::Cosine   => write!(f, "cosine"),
        }
    }
}

// ─── Sections ─────────────────────────────────────────────────────────────────
/// Spatial extent of the sampled domain: `[xmin, xmax, ymin, ymax]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub dim: [f64; 4],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { dim: [-0.75, 1.25, -0.5, 0.5] }
    }
}

/// Vision transformer hyperparameters.
/// `dim_model`, `dim_mlp` and `dropout_rate` also size the feed-forward block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitConfig {
    /// Grid resolution `[nx, ny]`
    pub img_size:     [usize; 2],
    pub patch_size:   usize,
    pub in_channels:  usize,
    /// Regressed channels: pressure, x-velocity, y-velocity
    pub out_channels: usize,
    pub num_layers:   usize,
    pub num_heads:    usize,
    pub dim_model:    usize,
    pub dim_mlp:      usize,
    pub dropout_rate: f64,
}

impl Default for VitConfig {
    fn default() -> Self {
        Self {
            img_size:     [64, 64],
            patch_size:   8,
            in_channels:  1,
            out_channels: 3,
            num_layers:   4,
            num_heads:    4,
            dim_model:    128,
            dim_mlp:      512,
            dropout_rate: 0.1,
        }
    }
}

// ─── ExperimentConfig ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// "train" or "inference"
    pub trainer:                 String,
    /// Directory holding `dataset_info.json` and one `<split>.jsonl` per split
    pub dataset:                 String,
    pub batch_size:              usize,
    pub num_epochs:              usize,
    pub learning_rate:           f64,
    pub learning_rate_scheduler: LearningRateScheduler,
    pub weight_decay:            f64,
    /// Seeds parameter initialisation and dropout masks
    pub seed:                    u64,
    pub device:                  DeviceKind,
    /// Where PNG figures are written
    pub output_dir:              String,
    pub checkpoint_dir:          String,
    /// Render prediction/delta figures every N epochs (0 disables them)
    pub plot_every:              usize,
    /// Colormap of the delta figure
    pub cmap:                    Colormap,
    pub preprocess:              PreprocessConfig,
    pub vit:                     VitConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trainer:                 "train".to_string(),
            dataset:                 "data/flow".to_string(),
            batch_size:              16,
            num_epochs:              100,
            learning_rate:           1e-3,
            learning_rate_scheduler: LearningRateScheduler::default(),
            weight_decay:            1e-4,
            seed:                    42,
            device:                  DeviceKind::default(),
            output_dir:              ".".to_string(),
            checkpoint_dir:          "checkpoints".to_string(),
            plot_every:              10,
            cmap:                    Colormap::default(),
            preprocess:              PreprocessConfig::default(),
            vit:                     VitConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Reject configurations that cannot describe a valid run.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.num_epochs > 0, "num_epochs must be positive");
        ensure!(
            self.learning_rate > 0.0 && self.learning_rate <= 1.0,
            "learning_rate must be in (0, 1], got {}",
            self.learning_rate
        );
        ensure!(self.weight_decay >= 0.0, "weight_decay must not be negative");

        let [xmin, xmax, ymin, ymax] = self.preprocess.dim;
        ensure!(xmin < xmax, "preprocess.dim: xmin ({xmin}) must be below xmax ({xmax})");
        ensure!(ymin < ymax, "preprocess.dim: ymin ({ymin}) must be below ymax ({ymax})");

        let vit = &self.vit;
        let [nx, ny] = vit.img_size;
        ensure!(vit.patch_size > 0, "vit.patch_size must be positive");
        ensure!(
            nx > 0 && ny > 0 && nx % vit.patch_size == 0 && ny % vit.patch_size == 0,
            "vit.img_size {:?} must be a positive multiple of patch_size {}",
            vit.img_size,
            vit.patch_size
        );
        ensure!(vit.in_channels > 0, "vit.in_channels must be positive");
        ensure!(
            vit.out_channels >= 3,
            "vit.out_channels must cover p, ux and uy (got {})",
            vit.out_channels
        );
        ensure!(vit.num_heads > 0, "vit.num_heads must be positive");
        ensure!(
            vit.dim_model % vit.num_heads == 0,
            "vit.dim_model ({}) must be divisible by vit.num_heads ({})",
            vit.dim_model,
            vit.num_heads
        );
        ensure!(vit.dim_mlp > 0, "vit.dim_mlp must be positive");
        ensure!(
            (0.0..1.0).contains(&vit.dropout_rate),
            "vit.dropout_rate must be in [0, 1), got {}",
            vit.dropout_rate
        );
        Ok(())
    }

    /// Number of values in one `[channels, nx, ny]` image with `channels` channels
    pub fn image_len(&self, channels: usize) -> usize {
        channels * self.vit.img_size[0] * self.vit.img_size[1]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExperimentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_trainer_parsing() {
        assert_eq!("train".parse::<Trainer>().unwrap(), Trainer::Train);
        assert_eq!("inference".parse::<Trainer>().unwrap(), Trainer::Inference);
        assert!("evaluate".parse::<Trainer>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "batch_size": 4, "vit": { "img_size": [32, 16] } }"#;
        let cfg: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.vit.img_size, [32, 16]);
        // Untouched keys keep their defaults
        assert_eq!(cfg.vit.patch_size, 8);
        assert_eq!(cfg.num_epochs, 100);
        assert_eq!(cfg.learning_rate_scheduler, LearningRateScheduler::Cosine);
    }

    #[test]
    fn test_rejects_indivisible_image_size() {
        let mut cfg = ExperimentConfig::default();
        cfg.vit.img_size = [60, 64];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut cfg = ExperimentConfig::default();
        cfg.preprocess.dim = [1.0, -1.0, 0.0, 1.0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_heads_not_dividing_width() {
        let mut cfg = ExperimentConfig::default();
        cfg.vit.num_heads = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let cfg = ExperimentConfig { batch_size: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_scheduler_display_matches_file_value() {
        assert_eq!(LearningRateScheduler::Cosine.to_string(), "cosine");
        let s: LearningRateScheduler = serde_json::from_str("\"constant\"").unwrap();
        assert_eq!(s, LearningRateScheduler::Constant);
    }
}
