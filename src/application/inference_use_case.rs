// ============================================================
// Layer 2 — InferenceUseCase
// ============================================================
// Selected with `"trainer": "inference"`. There is no inference
// workflow yet; the run reports that and exits successfully.

use anyhow::Result;

use crate::domain::config::ExperimentConfig;

pub const NOT_IMPLEMENTED: &str = "Implement inference";

pub struct InferenceUseCase {
    config: ExperimentConfig,
}

impl InferenceUseCase {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        // TODO: restore the latest checkpoint from `checkpoint_dir` and
        // plot predictions for the test split.
        tracing::warn!(
            "Inference is not implemented (checkpoint dir '{}')",
            self.config.checkpoint_dir
        );
        println!("{NOT_IMPLEMENTED}");
        Ok(())
    }
}
