use burn::data::dataset::Dataset;

use crate::domain::sample::FlowSample;

/// One loaded split, addressable by index through Burn's Dataset trait.
pub struct FlowDataset {
    samples: Vec<FlowSample>,
}

impl FlowDataset {
    pub fn new(samples: Vec<FlowSample>) -> Self { Self { samples } }
}

impl Dataset<FlowSample> for FlowDataset {
    fn get(&self, index: usize) -> Option<FlowSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
