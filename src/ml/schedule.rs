// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Chooses between Burn's schedulers from the config value:
//
//   constant → learning_rate on every step
//   cosine   → starts at learning_rate and anneals to 0 over
//              the total number of optimiser steps
//
// The trainer calls `step()` once per batch.
//
// Reference: Burn Book §5 (Learning Rate Scheduler)
//            Loshchilov & Hutter (2017) SGDR

use anyhow::{anyhow, Result};
use burn::lr_scheduler::{
    constant::ConstantLr,
    cosine::{CosineAnnealingLrScheduler, CosineAnnealingLrSchedulerConfig},
    LrScheduler,
};

use crate::domain::config::LearningRateScheduler;

#[derive(Clone, Debug)]
pub enum LrSchedule {
    Constant(ConstantLr),
    Cosine(CosineAnnealingLrScheduler),
}

impl LrSchedule {
    pub fn build(kind: LearningRateScheduler, learning_rate: f64, total_steps: usize) -> Result<Self> {
        match kind {
            LearningRateScheduler::Constant => Ok(LrSchedule::Constant(ConstantLr::new(learning_rate))),
            LearningRateScheduler::Cosine   => {
                let scheduler = CosineAnnealingLrSchedulerConfig::new(learning_rate, total_steps.max(1))
                    .init()
                    .map_err(|e| anyhow!("Invalid cosine schedule: {e}"))?;
                Ok(LrSchedule::Cosine(scheduler))
            }
        }
    }

    /// Learning rate for the next optimiser step.
    pub fn step(&mut self) -> f64 {
        match self {
            LrSchedule::Constant(s) => s.step(),
            LrSchedule::Cosine(s)   => s.step(),
        }
    }
}
