// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer takes a parallel corpus on disk all the way to
// padded id tensors for the encoder and decoder.
//
//   train.de / train.en (+ val.de / val.en)
//       │
//       ▼
//   ParallelCorpusLoader → line-aligned SentencePairs
//       │
//       ▼
//   Preprocessor         → lowercase, punctuation split off
//       │
//       ▼
//   Vocabulary (infra)   → word → id lookup
//       │
//       ▼
//   TranslationDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   Seq2SeqBatcher       → pads each batch to its longest row
//       │
//       ▼
//   DataLoader           → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads line-aligned source/target files
pub mod loader;

/// Normalises sentences before vocabulary lookup
pub mod preprocessor;

/// Implements Burn's Dataset trait for encoded pairs
pub mod dataset;

/// Implements Burn's Batcher trait with per-batch padding
pub mod batcher;

/// Seeded train/validation split for corpora without a val split
pub mod splitter;
