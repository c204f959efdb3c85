// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// One word-level vocabulary per language, persisted so a
// resumed run maps every word to the same id as the run that
// produced the checkpoint. A vocabulary rebuilt from scratch
// could shift ids and the embedding tables would silently
// stop matching their words.
//
// Ids 0–3 are reserved:
//   <unk> = 0   unknown / rare word
//   <pad> = 1   batch padding, ignored by the loss
//   <sos> = 2   start of sentence, first decoder input
//   <eos> = 3   end of sentence
//
// Words seen at least `min_freq` times in the training split
// follow, most frequent first, ties broken alphabetically so
// the build is deterministic.
//
// The vocabulary is written as a HuggingFace tokenizer JSON
// with a WordLevel model. Sentences go through the
// Preprocessor before encoding, which already separates
// punctuation, so the tokenizer only splits on whitespace.
//
// Files: {dir}/vocab.{ext}.json, e.g. saved/vocab.de.json

use anyhow::{Context, Result};
use std::{collections::HashMap, path::PathBuf};
use tokenizers::Tokenizer;

use crate::data::preprocessor::Preprocessor;

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";
pub const SOS_TOKEN: &str = "<sos>";
pub const EOS_TOKEN: &str = "<eos>";

const SPECIAL_TOKENS: [&str; 4] = [UNK_TOKEN, PAD_TOKEN, SOS_TOKEN, EOS_TOKEN];

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// A loaded vocabulary plus the ids of its special tokens.
pub struct Vocabulary {
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
    pub pad_id:   u32,
    pub sos_id:   u32,
    pub eos_id:   u32,
}

impl Vocabulary {
    fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        let id = |token: &str| {
            tokenizer
                .token_to_id(token)
                .with_context(|| format!("Vocabulary has no '{token}' entry"))
        };
        let pad_id = id(PAD_TOKEN)?;
        let sos_id = id(SOS_TOKEN)?;
        let eos_id = id(EOS_TOKEN)?;
        Ok(Self { tokenizer, preprocessor: Preprocessor::new(), pad_id, sos_id, eos_id })
    }

    /// Number of entries, specials included. Sizes the embedding table.
    pub fn size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    /// Encode a raw sentence as `<sos> ids… <eos>`, at most `max_len` ids long.
    /// Truncation keeps the closing <eos>.
    pub fn encode(&self, sentence: &str, max_len: usize) -> Result<Vec<u32>> {
        let cleaned  = self.preprocessor.clean(sentence);
        let encoding = self
            .tokenizer
            .encode(cleaned.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

        let body_len = max_len.saturating_sub(2);
        let mut ids  = Vec::with_capacity(encoding.get_ids().len().min(body_len) + 2);
        ids.push(self.sos_id);
        ids.extend(encoding.get_ids().iter().copied().take(body_len));
        ids.push(self.eos_id);
        Ok(ids)
    }
}

// ─── VocabStore ───────────────────────────────────────────────────────────────
pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("vocab.{ext}.json"))
    }

    /// Path of the saved vocabulary for `ext`, if one is on disk.
    pub fn existing(&self, ext: &str) -> Option<PathBuf> {
        Some(self.path(ext)).filter(|p| p.exists())
    }

    /// Load the saved vocabulary for `ext`, or build and save one from `sentences`.
    pub fn load_or_build(&self, ext: &str, sentences: &[&str], min_freq: usize) -> Result<Vocabulary> {
        let path = self.path(ext);
        if path.exists() {
            tracing::info!("Loading '{}' vocabulary from '{}'", ext, path.display());
            self.load(ext)
        } else {
            tracing::info!("Building '{}' vocabulary (min_freq={})", ext, min_freq);
            self.build_and_save(ext, sentences, min_freq)
        }
    }

    pub fn load(&self, ext: &str) -> Result<Vocabulary> {
        let path = self.path(ext);
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load vocabulary from '{}': {}", path.display(), e
            ))?;
        Vocabulary::from_tokenizer(tokenizer)
    }

    fn build_and_save(&self, ext: &str, sentences: &[&str], min_freq: usize) -> Result<Vocabulary> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Count word frequencies ────────────────────────────────────
        let preprocessor = Preprocessor::new();
        let mut freq: HashMap<String, usize> = HashMap::new();
        for sentence in sentences {
            for word in preprocessor.tokens(sentence) {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(String, usize)> = freq
            .into_iter()
            .filter(|(w, n)| *n >= min_freq && !SPECIAL_TOKENS.contains(&w.as_str()))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        // ── Step 2: Assign ids, specials first ────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(SPECIAL_TOKENS.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| serde_json::json!({
                "id": id, "content": token, "single_word": false,
                "lstrip": false, "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 3: Write tokenizer JSON in HuggingFace format ────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.path(ext);
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write vocabulary '{}'", path.display()))?;

        tracing::info!(
            "Vocabulary '{}' built with {} entries, saved to '{}'",
            ext,
            SPECIAL_TOKENS.len() + words.len(),
            path.display()
        );

        self.load(ext)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: [&str; 3] = [
        "A dog runs.",
        "A cat sleeps.",
        "The dog sleeps.",
    ];

    #[test]
    fn test_specials_have_fixed_ids() {
        let tmp   = tempfile::tempdir().unwrap();
        let vocab = VocabStore::new(tmp.path()).load_or_build("en", &CORPUS, 2).unwrap();
        assert_eq!(vocab.pad_id, 1);
        assert_eq!(vocab.sos_id, 2);
        assert_eq!(vocab.eos_id, 3);
    }

    #[test]
    fn test_min_freq_filters_rare_words() {
        let tmp   = tempfile::tempdir().unwrap();
        let vocab = VocabStore::new(tmp.path()).load_or_build("en", &CORPUS, 2).unwrap();
        // "a", "dog", "sleeps", "." appear twice or more; the rest once
        assert_eq!(vocab.size(), 4 + 4);

        let ids = vocab.encode("A dog flies.", 16).unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[0], vocab.sos_id);
        // "flies" is unknown
        assert_eq!(ids[3], 0);
        assert_eq!(*ids.last().unwrap(), vocab.eos_id);
    }

    #[test]
    fn test_encode_truncates_but_keeps_eos() {
        let tmp   = tempfile::tempdir().unwrap();
        let vocab = VocabStore::new(tmp.path()).load_or_build("en", &CORPUS, 1).unwrap();
        let ids   = vocab.encode("a dog a dog a dog a dog", 5).unwrap();
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], vocab.sos_id);
        assert_eq!(ids[4], vocab.eos_id);
    }

    #[test]
    fn test_saved_vocabulary_is_reused() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = VocabStore::new(tmp.path());
        let first = store.load_or_build("en", &CORPUS, 1).unwrap();
        let ids   = first.encode("the cat runs", 16).unwrap();

        // A different corpus must not change ids once the file exists
        let second = store.load_or_build("en", &["zebra zebra zebra"], 1).unwrap();
        assert_eq!(second.encode("the cat runs", 16).unwrap(), ids);
        assert_eq!(second.size(), first.size());
    }

    #[test]
    fn test_existing_only_after_save() {
        let tmp   = tempfile::tempdir().unwrap();
        let store = VocabStore::new(tmp.path());
        assert!(store.existing("de").is_none());

        store.load_or_build("de", &CORPUS, 1).unwrap();
        assert_eq!(store.existing("de"), Some(tmp.path().join("vocab.de.json")));
        assert!(store.existing("en").is_none());
    }
}
