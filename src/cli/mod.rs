// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// The binary takes a single flag:
//   --config <FILE>   JSON experiment configuration
//
// The `trainer` field of that file picks the workflow:
//   "train"     — train the ViT regressor
//   "inference" — placeholder, prints a notice
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::application::inference_use_case::InferenceUseCase;
use crate::application::train_use_case::TrainUseCase;
use crate::domain::config::{ExperimentConfig, Trainer};
use crate::domain::topology::ProcessTopology;
use crate::infra::config_loader::load_config;

/// clap rejects positional arguments on its own since none are declared.
#[derive(Parser, Debug)]
#[command(
    name = "vit-flow",
    version = "0.1.0",
    about = "Train a vision transformer to predict flow fields around geometries."
)]
pub struct Cli {
    /// JSON experiment configuration
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,
}

impl Cli {
    /// Load the configuration and dispatch on its `trainer` field.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        let cfg      = load_config(&self.config)?;
        let topology = ProcessTopology::from_env()?;

        tracing::info!("Running as {topology}, device = {}", cfg.device);

        let trainer = parse_trainer(&cfg).unwrap_or_else(|e| e.exit());
        match trainer {
            Trainer::Train     => self.run_train(cfg, topology),
            Trainer::Inference => InferenceUseCase::new(cfg).execute(),
        }
    }

    fn run_train(&self, cfg: ExperimentConfig, topology: ProcessTopology) -> Result<()> {
        tracing::info!("Training on dataset '{}'", cfg.dataset);

        let report = TrainUseCase::new(cfg, topology).execute()?;

        if let (Some(train), Some(test)) = (report.train_loss.last(), report.test_loss.last()) {
            println!("Training complete. Final train loss {train:.6}, test loss {test:.6}");
        }
        if let Some(path) = &report.loss_plot {
            println!("Loss curve written to {}", path.display());
        }
        Ok(())
    }
}

/// An unknown trainer is a usage error, reported the way clap reports
/// a bad flag value.
fn parse_trainer(cfg: &ExperimentConfig) -> std::result::Result<Trainer, clap::Error> {
    cfg.trainer.parse::<Trainer>().map_err(|e| {
        Cli::command().error(
            ErrorKind::InvalidValue,
            format!("{e} (expected \"train\" or \"inference\")"),
        )
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_flag_is_parsed() {
        let cli = Cli::try_parse_from(["vit-flow", "--config", "exp.json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("exp.json"));
    }

    #[test]
    fn test_config_flag_is_required() {
        let err = Cli::try_parse_from(["vit-flow"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_positional_argument_is_rejected() {
        let err = Cli::try_parse_from(["vit-flow", "--config", "exp.json", "extra"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_known_trainers_dispatch() {
        let mut cfg = ExperimentConfig::default();
        assert_eq!(parse_trainer(&cfg).unwrap(), Trainer::Train);
        cfg.trainer = "inference".to_string();
        assert_eq!(parse_trainer(&cfg).unwrap(), Trainer::Inference);
    }

    #[test]
    fn test_unknown_trainer_is_usage_error() {
        let cfg = ExperimentConfig { trainer: "finetune".to_string(), ..Default::default() };
        let err = parse_trainer(&cfg).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_inference_run_succeeds() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp.json");
        std::fs::write(&path, r#"{ "trainer": "inference", "device": "cpu" }"#).unwrap();

        let cli = Cli { config: path };
        assert!(cli.run().is_ok());
    }
}
