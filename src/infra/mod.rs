// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting file I/O that doesn't belong to any one layer:
//
//   config_loader.rs — Reads and validates the --config JSON
//
//   checkpoint.rs    — Saves model weights with Burn's
//                      CompactRecorder and keeps a copy of the
//                      experiment config next to them
//
//   metrics.rs       — Writes epoch-level losses to a CSV file
//                      for later analysis and plotting
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Experiment config loading and validation
pub mod config_loader;

/// Model checkpoint saving
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
