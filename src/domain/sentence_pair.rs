// ============================================================
// Layer 3 — SentencePair Domain Type
// ============================================================
// One line of a parallel corpus: a sentence in the source
// language and its translation in the target language.
//
// The pair is raw text. Tokenisation and id lookup happen
// later in the data pipeline, once the vocabulary is known.
//
// Example:
//   source: "Zwei Männer stehen am Herd."
//   target: "Two men are standing at the stove."

use serde::{Deserialize, Serialize};

/// A line-aligned translation example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    /// Sentence fed to the encoder
    pub source: String,

    /// Sentence the decoder learns to produce
    pub target: String,
}

impl SentencePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// A pair is usable only when both sides carry text.
    /// Corpora often end with a trailing blank line.
    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty() || self.target.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detection() {
        assert!(SentencePair::new("", "a dog").is_blank());
        assert!(SentencePair::new("ein Hund", "   ").is_blank());
        assert!(!SentencePair::new("ein Hund", "a dog").is_blank());
    }
}
