// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model math lives here. Other layers only hand it data
// loaders and a checkpoint manager.
//
// What's in this layer:
//
//   model.rs      Encoder-decoder transformer
//                 • Source and target token embeddings
//                 • Sinusoidal positional encoding
//                 • Encoder / decoder stacks with pad masks
//                   and a causal mask on the decoder
//                 • Linear generator over the target vocabulary
//                 • Teacher-forced, pad-masked cross-entropy
//
//   grad_clip.rs  Clipping of all gradients to one global norm
//
//   scheduler.rs  Reduce-on-plateau learning-rate schedule
//                 driven by validation loss
//
//   trainer.rs    Training step, evaluation step and the
//                 resumable epoch loop that checkpoints after
//                 every epoch
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Encoder-decoder transformer architecture
pub mod model;

/// Global gradient-norm clipping
pub mod grad_clip;

/// Plateau learning-rate scheduler
pub mod scheduler;

/// Epoch loop with validation and checkpointing
pub mod trainer;
