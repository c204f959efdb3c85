// ============================================================
// Layer 6 — Loss History Store
// ============================================================
// Keeps the per-epoch training and validation losses across
// process restarts, one file per sequence:
//
//   result/
//     train.txt   [5.21, 4.87, 4.55]
//     test.txt    [5.02, 4.80, 4.61]
//
// The file format is the plain list rendering of the sequence,
// a single line. Reading strips the brackets and commas, then
// splits on whitespace and parses each token as f64.
//
// On restart the length of train.txt tells the driver how many
// epochs are already done, so the two files must always have
// the same length. Both are rewritten after every epoch, each
// through a temporary sibling and a rename so an interrupted
// write leaves the previous version intact.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Parse a rendered loss list such as `[2.31, 1.98, 1.77]`.
/// `[]` (or an empty file) is an empty history.
pub fn parse_loss_record(text: &str) -> Result<Vec<f64>> {
    text.replace(['[', ']', ','], " ")
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .with_context(|| format!("Invalid loss value '{token}'"))
        })
        .collect()
}

/// Render losses as a single-line list, each value in shortest
/// round-trip form: `[2.31, 1.98, 1.77]`.
pub fn render_loss_record(losses: &[f64]) -> String {
    format!("{losses:?}")
}

/// Read a loss file, returning the sequence and its length.
pub fn load_loss_record(path: &Path) -> Result<(Vec<f64>, usize)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read loss history '{}'", path.display()))?;
    let losses = parse_loss_record(&text)
        .with_context(|| format!("Malformed loss history '{}'", path.display()))?;
    let count = losses.len();
    Ok((losses, count))
}

/// Replace a loss file with the rendering of `losses`.
pub fn save_loss_record(path: &Path, losses: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    write_atomic(path, &render_loss_record(losses))
}

/// Write `contents` to a `.tmp` sibling, then rename it over `path`.
/// A reader sees either the old file or the new one, never a torn write.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents)
        .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Cannot replace '{}'", path.display()))?;
    Ok(())
}

// ─── LossHistory ──────────────────────────────────────────────────────────────
/// Both loss sequences plus the files they persist to.
#[derive(Debug, Clone)]
pub struct LossHistory {
    train_path: PathBuf,
    valid_path: PathBuf,
    train:      Vec<f64>,
    valid:      Vec<f64>,
}

impl LossHistory {
    /// Start an empty history that will be written to the given files.
    pub fn empty(train_path: impl Into<PathBuf>, valid_path: impl Into<PathBuf>) -> Self {
        Self {
            train_path: train_path.into(),
            valid_path: valid_path.into(),
            train:      Vec::new(),
            valid:      Vec::new(),
        }
    }

    /// Load an existing history. Both files are required and must
    /// hold the same number of epochs.
    pub fn load(train_path: impl Into<PathBuf>, valid_path: impl Into<PathBuf>) -> Result<Self> {
        let mut history = Self::empty(train_path, valid_path);
        let (train, train_count) = load_loss_record(&history.train_path)?;
        let (valid, valid_count) = load_loss_record(&history.valid_path)?;

        if train_count != valid_count {
            bail!(
                "Loss history is out of step: '{}' has {} epochs, '{}' has {}",
                history.train_path.display(),
                train_count,
                history.valid_path.display(),
                valid_count,
            );
        }

        history.train = train;
        history.valid = valid;
        Ok(history)
    }

    /// Load the history if the train file exists, otherwise start empty.
    /// Used for fresh runs, where no previous epochs are expected.
    pub fn load_or_empty(train_path: impl Into<PathBuf>, valid_path: impl Into<PathBuf>) -> Result<Self> {
        let train_path = train_path.into();
        let valid_path = valid_path.into();
        if train_path.exists() {
            Self::load(train_path, valid_path)
        } else {
            Ok(Self::empty(train_path, valid_path))
        }
    }

    /// Number of completed epochs on record.
    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    pub fn train(&self) -> &[f64] {
        &self.train
    }

    pub fn valid(&self) -> &[f64] {
        &self.valid
    }

    /// Lowest validation loss on record, if any.
    pub fn best_valid(&self) -> Option<f64> {
        self.valid.iter().copied().reduce(f64::min)
    }

    /// Record one finished epoch.
    pub fn push(&mut self, train_loss: f64, valid_loss: f64) {
        self.train.push(train_loss);
        self.valid.push(valid_loss);
    }

    /// Rewrite both files with the full history.
    pub fn save(&self) -> Result<()> {
        save_loss_record(&self.train_path, &self.train)?;
        save_loss_record(&self.valid_path, &self.valid)?;
        tracing::debug!(
            "Loss history saved ({} epochs) to '{}' and '{}'",
            self.len(),
            self.train_path.display(),
            self.valid_path.display(),
        );
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_list_rendering() {
        let losses = parse_loss_record("[2.31, 1.98, 1.77]").unwrap();
        assert_eq!(losses, vec![2.31, 1.98, 1.77]);
    }

    #[test]
    fn test_parses_python_style_exponents_and_newline() {
        let losses = parse_loss_record("[1e-05, 3.0, 4.25]\n").unwrap();
        assert_eq!(losses, vec![1e-5, 3.0, 4.25]);
    }

    #[test]
    fn test_empty_list_is_empty_history() {
        assert!(parse_loss_record("[]").unwrap().is_empty());
        assert!(parse_loss_record("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        assert!(parse_loss_record("[2.31, abc]").is_err());
    }

    #[test]
    fn test_render_matches_list_format() {
        assert_eq!(render_loss_record(&[2.31, 1.98, 3.0]), "[2.31, 1.98, 3.0]");
        assert_eq!(render_loss_record(&[]), "[]");
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let tmp    = tempfile::tempdir().unwrap();
        let path   = tmp.path().join("result").join("train.txt");
        let losses = vec![5.213_456_789, 4.1, 0.000_012_3, 2.0 / 3.0];

        save_loss_record(&path, &losses).unwrap();
        let (loaded, count) = load_loss_record(&path).unwrap();

        assert_eq!(count, 4);
        assert_eq!(loaded, losses);
        // The temporary sibling is renamed away
        assert!(!tmp.path().join("result").join("train.txt.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_loss_record(&tmp.path().join("absent.txt")).is_err());
    }

    #[test]
    fn test_history_rejects_unequal_lengths() {
        let tmp   = tempfile::tempdir().unwrap();
        let train = tmp.path().join("train.txt");
        let valid = tmp.path().join("test.txt");
        fs::write(&train, "[3.0, 2.5]").unwrap();
        fs::write(&valid, "[3.1]").unwrap();

        assert!(LossHistory::load(&train, &valid).is_err());
    }

    #[test]
    fn test_history_push_save_reload() {
        let tmp   = tempfile::tempdir().unwrap();
        let train = tmp.path().join("train.txt");
        let valid = tmp.path().join("test.txt");

        let mut history = LossHistory::load_or_empty(&train, &valid).unwrap();
        assert!(history.is_empty());

        history.push(4.2, 4.4);
        history.push(3.9, 4.1);
        history.save().unwrap();

        let reloaded = LossHistory::load(&train, &valid).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.train(), &[4.2, 3.9]);
        assert_eq!(reloaded.valid(), &[4.4, 4.1]);
        assert_eq!(reloaded.best_valid(), Some(4.1));
    }
}
