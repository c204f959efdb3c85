// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to the corpus through this trait
// so the on-disk layout can change without touching the
// training workflow.
//
// Implementations:
//   - ParallelCorpusLoader → line-aligned text files per language
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::sentence_pair::SentencePair;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Anything that can produce the training and validation pairs.
pub trait CorpusSource {
    /// Pairs used to update the model weights.
    fn load_train(&self) -> Result<Vec<SentencePair>>;

    /// Held-out pairs used for the per-epoch validation loss.
    /// `Ok(None)` means the source has no dedicated validation split.
    fn load_valid(&self) -> Result<Option<Vec<SentencePair>>>;
}
