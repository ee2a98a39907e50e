// ============================================================
// Layer 3 — Process Topology
// ============================================================
// Where this process sits in a (possibly) distributed job.
//
// The launcher exports two environment variables:
//   VIT_PROCESS_INDEX  - 0-based rank of this process (default 0)
//   VIT_PROCESS_COUNT  - total number of processes     (default 1)
//
// Each process reads a contiguous, disjoint slice of every
// split. With `len` examples and `count` processes the first
// `len % count` processes receive one extra example:
//
//   len = 10, count = 3  →  [0..4) [4..7) [7..10)
//
// Reference: Rust Book §12.5 (Working with Environment Variables)

use std::env;
use std::fmt;
use std::ops::Range;

use anyhow::{ensure, Context, Result};

pub const PROCESS_INDEX_VAR: &str = "VIT_PROCESS_INDEX";
pub const PROCESS_COUNT_VAR: &str = "VIT_PROCESS_COUNT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessTopology {
    pub index: usize,
    pub count: usize,
}

impl ProcessTopology {
    pub fn new(index: usize, count: usize) -> Result<Self> {
        ensure!(count > 0, "Process count must be positive");
        ensure!(index < count, "Process index {index} must be below process count {count}");
        Ok(Self { index, count })
    }

    /// A single-process job.
    #[cfg(test)]
    pub fn single() -> Self {
        Self { index: 0, count: 1 }
    }

    /// Read the topology from the environment, defaulting to a single process.
    pub fn from_env() -> Result<Self> {
        let index = read_var(PROCESS_INDEX_VAR, 0)?;
        let count = read_var(PROCESS_COUNT_VAR, 1)?;
        Self::new(index, count)
    }

    pub fn is_primary(&self) -> bool {
        self.index == 0
    }

    /// Index range of this process's shard of a split with `len` examples.
    pub fn shard_range(&self, len: usize) -> Range<usize> {
        let base  = len / self.count;
        let extra = len % self.count;
        let start = self.index * base + self.index.min(extra);
        let size  = base + usize::from(self.index < extra);
        start..start + size
    }
}

impl fmt::Display for ProcessTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process {}/{}", self.index, self.count)
    }
}

fn read_var(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
