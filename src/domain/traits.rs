// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The data pipeline never touches the filesystem directly; it
// asks a SplitSource for the examples of a named split.
//
//   - DatasetDir implements SplitSource (dataset_info.json + jsonl)
//   - Tests use an in-memory source
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sample::FlowSample;

// ─── SplitSource ──────────────────────────────────────────────────────────────
/// Anything that can hand out the examples of a named split
/// ("train", "test", ...).
pub trait SplitSource {
    /// Number of examples in `split`, without loading them.
    fn split_len(&self, split: &str) -> Result<usize>;

    /// Load every example of `split`, in stored order.
    fn load_split(&self, split: &str) -> Result<Vec<FlowSample>>;
}
