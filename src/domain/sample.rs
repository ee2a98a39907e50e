use serde::{Deserialize, Serialize};

/// One dataset example: an input image and the flow fields it maps to.
/// Both are channel-first, row-major (`[channels, nx, ny]` flattened).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSample {
    pub inputs:  Vec<f32>,
    pub targets: Vec<f32>,
}

impl FlowSample {
    pub fn new(inputs: Vec<f32>, targets: Vec<f32>) -> Self {
        Self { inputs, targets }
    }

    pub fn has_shape(&self, input_len: usize, target_len: usize) -> bool {
        self.inputs.len() == input_len && self.targets.len() == target_len
    }
}
