// ============================================================
// Layer 4 — Parallel Corpus Loader
// ============================================================
// Reads a translation corpus stored as one sentence per line,
// one file per language, with matching line numbers:
//
//   data/
//     train.de   train.en     ← required
//     val.de     val.en       ← optional
//
// Line N of train.de is the translation of line N of train.en.
// A length mismatch between the two files means the corpus is
// misaligned, which is reported as an error rather than
// silently truncated.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{bail, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::sentence_pair::SentencePair;
use crate::domain::traits::CorpusSource;

/// Loads line-aligned sentence pairs from a directory.
/// Implements the CorpusSource trait from Layer 3.
pub struct ParallelCorpusLoader {
    /// Directory holding `{split}.{ext}` files
    dir: PathBuf,

    /// File extension of the source language, e.g. "de"
    src_ext: String,

    /// File extension of the target language, e.g. "en"
    trg_ext: String,
}

impl ParallelCorpusLoader {
    pub fn new(
        dir:     impl Into<PathBuf>,
        src_ext: impl Into<String>,
        trg_ext: impl Into<String>,
    ) -> Self {
        Self {
            dir:     dir.into(),
            src_ext: src_ext.into(),
            trg_ext: trg_ext.into(),
        }
    }

    fn split_paths(&self, split: &str) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{split}.{}", self.src_ext)),
            self.dir.join(format!("{split}.{}", self.trg_ext)),
        )
    }

    fn load_split(&self, split: &str) -> Result<Vec<SentencePair>> {
        let (src_path, trg_path) = self.split_paths(split);
        let sources = read_lines(&src_path)?;
        let targets = read_lines(&trg_path)?;

        if sources.len() != targets.len() {
            bail!(
                "Corpus split '{}' is misaligned: '{}' has {} lines, '{}' has {}",
                split,
                src_path.display(),
                sources.len(),
                trg_path.display(),
                targets.len(),
            );
        }

        let total = sources.len();
        let pairs: Vec<SentencePair> = sources
            .into_iter()
            .zip(targets)
            .map(|(s, t)| SentencePair::new(s, t))
            .filter(|p| !p.is_blank())
            .collect();

        if pairs.len() < total {
            tracing::debug!(
                "Dropped {} blank pairs from split '{}'",
                total - pairs.len(),
                split
            );
        }

        tracing::info!("Loaded {} pairs from split '{}'", pairs.len(), split);
        Ok(pairs)
    }
}

impl CorpusSource for ParallelCorpusLoader {
    fn load_train(&self) -> Result<Vec<SentencePair>> {
        self.load_split("train")
    }

    fn load_valid(&self) -> Result<Option<Vec<SentencePair>>> {
        let (src_path, trg_path) = self.split_paths("val");
        if !src_path.exists() || !trg_path.exists() {
            tracing::warn!(
                "No validation split under '{}'; falling back to a held-out slice of train",
                self.dir.display()
            );
            return Ok(None);
        }
        self.load_split("val").map(Some)
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read corpus file '{}'", path.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}
