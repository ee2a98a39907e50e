// ============================================================
// Layer 4 — Flow Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<FlowSample>
// into two image tensors.
//
// How batching works here:
//   Input:  N FlowSamples, each `c × nx × ny` values, channel first
//   Output: FlowBatch with tensors of shape [N, c, nx, ny]
//
//   Samples are already flat and channel first, so stacking is
//   just concatenation followed by a reshape:
//   [s1..., s2..., ..., sN...] → [N, c, nx, ny]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::config::ExperimentConfig;
use crate::domain::sample::FlowSample;

// ─── FlowBatch ────────────────────────────────────────────────────────────────
/// A batch of examples ready for the forward pass.
#[derive(Debug, Clone)]
pub struct FlowBatch<B: Backend> {
    /// Input images — shape: [batch_size, in_channels, nx, ny]
    pub inputs: Tensor<B, 4>,

    /// Target fields — shape: [batch_size, out_channels, nx, ny]
    pub targets: Tensor<B, 4>,
}

impl<B: Backend> FlowBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.inputs.dims()[0]
    }
}

// ─── FlowBatcher ──────────────────────────────────────────────────────────────
/// Knows the image geometry; the device is supplied per call.
#[derive(Clone, Copy, Debug)]
pub struct FlowBatcher {
    pub in_channels:  usize,
    pub out_channels: usize,
    pub nx:           usize,
    pub ny:           usize,
}

impl FlowBatcher {
    pub fn from_config(cfg: &ExperimentConfig) -> Self {
        Self {
            in_channels:  cfg.vit.in_channels,
            out_channels: cfg.vit.out_channels,
            nx:           cfg.vit.img_size[0],
            ny:           cfg.vit.img_size[1],
        }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<B, FlowSample, FlowBatch<B>> for FlowBatcher {
    fn batch(&self, items: Vec<FlowSample>, device: &B::Device) -> FlowBatch<B> {
        let batch_size = items.len();

        let input_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.inputs.iter().copied())
            .collect();

        let target_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.targets.iter().copied())
            .collect();

        let inputs = Tensor::<B, 1>::from_floats(input_flat.as_slice(), device)
            .reshape([batch_size, self.in_channels, self.nx, self.ny]);

        let targets = Tensor::<B, 1>::from_floats(target_flat.as_slice(), device)
            .reshape([batch_size, self.out_channels, self.nx, self.ny]);

        FlowBatch { inputs, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_layout() {
        let batcher = FlowBatcher { in_channels: 1, out_channels: 3, nx: 2, ny: 2 };
        let items   = vec![
            FlowSample::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.5; 12]),
            FlowSample::new(vec![4.0, 5.0, 6.0, 7.0], vec![1.5; 12]),
        ];
        let device = Default::default();
        let batch: FlowBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.inputs.dims(),  [2, 1, 2, 2]);
        assert_eq!(batch.targets.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.batch_size(), 2);

        // Second sample, node (1, 0)
        let v: f32 = batch
            .inputs
            .slice([1..2, 0..1, 1..2, 0..1])
            .into_scalar()
            .elem();
        assert_eq!(v, 6.0);
    }
}
