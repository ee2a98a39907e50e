// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or runs the network.
//
// What's in this layer:
//
//   mlp.rs       — The feed-forward block of an encoder layer
//                  Dense → GELU → Dropout → Dense → Dropout,
//                  with dropout driven by an explicit flag and
//                  a caller-supplied RNG
//
//   model.rs     — The ViT regressor
//                  • Patchify images into tokens
//                  • Patch + position embeddings
//                  • Pre-norm encoder blocks (attention + MLP)
//                  • Linear head back to pixel patches
//
//   schedule.rs  — Constant or cosine learning-rate schedule
//
//   trainer.rs   — The training loop
//                  Forward pass, MSE, backward pass, AdamW
//                  step, evaluation, checkpoints and figures
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Dosovitskiy et al. (2021) An Image is Worth 16x16 Words

/// Feed-forward block
pub mod mlp;

/// Vision transformer regressor
pub mod model;

/// Learning-rate schedules
pub mod schedule;

/// Epoch loop with evaluation and checkpointing
pub mod trainer;
