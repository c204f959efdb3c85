// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// training run:
//
//   checkpoint.rs     Model weights and optimizer state
//                     Burn named MessagePack records for the
//                     resume point and best-so-far snapshots,
//                     plus the run config as JSON.
//
//   loss_history.rs   Per-epoch train/validation losses
//                     Two list-formatted text files that let a
//                     restarted run know how far it got.
//
//   vocab_store.rs    Word-level vocabularies
//                     Built once from the training split and
//                     reloaded on every later run so token ids
//                     never shift under a checkpoint.
//
//   metrics.rs        Per-epoch summary
//                     Perplexity, timing and the improvement
//                     test behind best-model checkpoints.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model and optimizer checkpoint saving and loading
pub mod checkpoint;

/// Train/validation loss history files
pub mod loss_history;

/// Vocabulary building, saving, and loading
pub mod vocab_store;

/// Epoch metrics and reporting
pub mod metrics;
