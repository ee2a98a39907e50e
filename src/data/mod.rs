// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from the dataset directory on
// disk to tensor batches on the training device.
//
// The pipeline flows in this order:
//
//   dataset directory (dataset_info.json + <split>.jsonl)
//       │
//       ▼
//   DatasetDir        → reads and validates one split
//       │
//       ▼
//   FlowDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   shard_for_process → keeps this process's window of the split
//       │
//       ▼
//   ShuffleBuffer     → seeded streaming shuffle (train only)
//       │
//       ▼
//   FlowBatcher       → stacks samples into [N, C, nx, ny] tensors
//       │
//       ▼
//   BatchStream       → prefetching iterator consumed by training
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads dataset_info.json and <split>.jsonl files
pub mod loader;

/// Implements Burn's Dataset trait for flow samples
pub mod dataset;

/// Selects the shard of a split owned by this process
pub mod splitter;

/// Bounded streaming shuffle
pub mod shuffle;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Wires the steps together behind a prefetching iterator
pub mod pipeline;
