// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that describe the experiment:
// the configuration, the flow fields we regress, a single
// dataset example, and the topology of the distributed job.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO plotting types
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Experiment configuration (the `--config` file)
pub mod config;

// Flow fields, grids and colormaps
pub mod field;

// One input/target example
pub mod sample;

// Process index/count of a distributed job
pub mod topology;

// Core abstractions (traits) that other layers implement
pub mod traits;
