// ============================================================
// Layer 3 — Flow Fields
// ============================================================
// Host-side representation of what the model regresses.
//
// A FlowField is a channel-first block of f32 values:
//
//   values[c * nx * ny + i * ny + j]  =  channel c at node (x_i, y_j)
//
// A single 2-D field is simply a FlowField with one channel.
// The Grid gives every node its physical coordinate, built from
// `preprocess.dim` and `vit.img_size` of the experiment config.
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

use std::fmt;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::config::ExperimentConfig;

// ─── FieldName ────────────────────────────────────────────────────────────────
/// The three physical quantities, in output channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Pressure,
    VelocityX,
    VelocityY,
}

impl FieldName {
    pub const ALL: [FieldName; 3] = [
        FieldName::Pressure,
        FieldName::VelocityX,
        FieldName::VelocityY,
    ];

    /// Map an output channel index to its field. Only 0, 1 and 2 exist.
    pub fn from_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(FieldName::Pressure),
            1 => Ok(FieldName::VelocityX),
            2 => Ok(FieldName::VelocityY),
            n => bail!("No flow field with index {n} (expected 0 = p, 1 = ux, 2 = uy)"),
        }
    }

    pub fn channel(self) -> usize {
        match self {
            FieldName::Pressure  => 0,
            FieldName::VelocityX => 1,
            FieldName::VelocityY => 2,
        }
    }

    /// Short name used in file names and labels
    pub fn short(self) -> &'static str {
        match self {
            FieldName::Pressure  => "p",
            FieldName::VelocityX => "ux",
            FieldName::VelocityY => "uy",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

// ─── Colormap ─────────────────────────────────────────────────────────────────
/// Colormaps a user may pick for error heatmaps.
/// The RGB lookup lives in the visualization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Viridis,
    Bone,
    Copper,
    Gray,
    Coolwarm,
}

// ─── Grid ─────────────────────────────────────────────────────────────────────
/// Regular node grid over `[xmin, xmax] × [ymin, ymax]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub nx:   usize,
    pub ny:   usize,
}

impl Grid {
    pub fn from_config(cfg: &ExperimentConfig) -> Self {
        let [xmin, xmax, ymin, ymax] = cfg.preprocess.dim;
        let [nx, ny] = cfg.vit.img_size;
        Self { xmin, xmax, ymin, ymax, nx, ny }
    }

    pub fn dx(&self) -> f64 {
        spacing(self.xmin, self.xmax, self.nx)
    }

    pub fn dy(&self) -> f64 {
        spacing(self.ymin, self.ymax, self.ny)
    }

    /// x coordinate of node `i`
    pub fn x(&self, i: usize) -> f64 {
        self.xmin + i as f64 * self.dx()
    }

    /// y coordinate of node `j`
    pub fn y(&self, j: usize) -> f64 {
        self.ymin + j as f64 * self.dy()
    }
}

// A single node spans the whole interval.
fn spacing(lo: f64, hi: f64, n: usize) -> f64 {
    if n > 1 { (hi - lo) / (n - 1) as f64 } else { hi - lo }
}

// ─── FlowField ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub channels: usize,
    pub nx:       usize,
    pub ny:       usize,
    values:       Vec<f32>,
}

impl FlowField {
    pub fn new(channels: usize, nx: usize, ny: usize, values: Vec<f32>) -> Result<Self> {
        ensure!(
            values.len() == channels * nx * ny,
            "Flow field expects {channels}x{nx}x{ny} = {} values, got {}",
            channels * nx * ny,
            values.len()
        );
        Ok(Self { channels, nx, ny, values })
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.nx, self.ny]
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, c: usize, i: usize, j: usize) -> f32 {
        self.values[(c * self.nx + i) * self.ny + j]
    }

    /// Copy channel `c` out as a single-channel field.
    pub fn channel(&self, c: usize) -> Result<FlowField> {
        ensure!(
            c < self.channels,
            "Channel {c} out of range for a field with {} channels",
            self.channels
        );
        let plane = self.nx * self.ny;
        let values = self.values[c * plane..(c + 1) * plane].to_vec();
        FlowField::new(1, self.nx, self.ny, values)
    }

    /// Element-wise `self - other`. Shapes must agree.
    pub fn difference(&self, other: &FlowField) -> Result<FlowField> {
        ensure!(
            self.shape() == other.shape(),
            "Shape mismatch: {:?} vs {:?}",
            self.shape(),
            other.shape()
        );
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a - b)
            .collect();
        FlowField::new(self.channels, self.nx, self.ny, values)
    }

    /// Smallest and largest finite value, or None when there is none.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None             => Some((v, v)),
                Some((lo, hi))   => Some((lo.min(v), hi.max(v))),
            })
    }
}
