// ============================================================
// Layer 4 — Sentence Preprocessor
// ============================================================
// Normalises a raw sentence into space-separated word tokens
// before vocabulary lookup.
//
// The vocabulary is word-level and splits on whitespace only,
// so every decision about what counts as a token is made here:
//
//   1. Map Unicode whitespace variants and control characters
//      to a plain space
//   2. Lowercase
//   3. Put spaces around punctuation so "stove." becomes
//      "stove .", one word and one punctuation token
//   4. Collapse runs of spaces and trim the ends
//
// The same preprocessor runs when the vocabulary is built and
// when sentences are encoded, which keeps both sides in step.
//
// Reference: Rust Book §8 (Strings in Rust)
//            Rust Book §13 (Iterators)

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw sentence and return its token string.
    pub fn clean(&self, text: &str) -> String {
        // ── Step 1–3: character-level normalisation ──────────────────────────
        let mut spaced = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            match c {
                '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => spaced.push(' '),
                c if c.is_control() => spaced.push(' '),
                // Apostrophes and hyphens stay inside words ("don't", "t-shirt")
                '\'' | '-' => spaced.push(c),
                c if c.is_ascii_punctuation() => {
                    spaced.push(' ');
                    spaced.push(c);
                    spaced.push(' ');
                }
                c => spaced.extend(c.to_lowercase()),
            }
        }

        // ── Step 4: collapse whitespace ──────────────────────────────────────
        spaced.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Tokens of a cleaned sentence, in order.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        self.clean(text)
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
