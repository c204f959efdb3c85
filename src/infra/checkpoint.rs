// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights and optimizer state with
// Burn's named MessagePack file recorder.
//
// Files in the checkpoint directory:
//
//   saved/
//     model-saved.mpk        ← resume point: weights after the
//     optim-saved.mpk          last finished epoch, plus Adam
//                              moments for the same parameters
//     model-2.4817.mpk       ← best-so-far snapshots, named by
//     model-2.3925.mpk         their validation loss
//     scheduler.json         ← plateau scheduler state (resume point)
//     train_config.json      ← hyperparameters of the run
//
// Resume point vs. best snapshots:
//   The resume point is rewritten after every epoch so a
//   restarted process continues exactly where the previous one
//   stopped. Best snapshots are only written when validation
//   loss improves; the `keep_best` retention policy deletes all
//   but the K lowest-loss ones (0 keeps every snapshot).
//
// Records are written at full precision so a resumed run
// starts from exactly the weights the previous run ended with.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::PathBuf,
};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::infra::loss_history::write_atomic;
use crate::ml::model::Seq2SeqTransformer;
use crate::ml::scheduler::PlateauScheduler;

type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// File recorders force this extension onto whatever path they get.
/// Loss-named stems contain a dot, so paths always carry it explicitly.
const RECORD_EXT: &str = "mpk";

/// Records are written under `{stem}.tmp.mpk` and renamed into place.
const TMP_STEM_SUFFIX: &str = ".tmp";

pub const RESUME_MODEL_STEM: &str = "model-saved";
const RESUME_OPTIM_STEM: &str = "optim-saved";
const BEST_PREFIX: &str = "model-";
const SCHEDULER_FILE: &str = "scheduler.json";
const CONFIG_FILE: &str = "train_config.json";

pub struct CheckpointManager {
    dir:       PathBuf,
    keep_best: usize,
    recorder:  CheckpointRecorder,
}

impl CheckpointManager {
    /// Create a manager over `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, keep_best: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, keep_best, recorder: CheckpointRecorder::new() })
    }

    /// Full path of the record file for a stem, e.g. `model-saved` → `saved/model-saved.mpk`.
    pub fn record_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{RECORD_EXT}"))
    }

    // ── Weights ──────────────────────────────────────────────────────────────

    /// Apply the weights stored under `stem` to `model`.
    ///
    /// The record must come from a model with the same architecture:
    /// a parameter count or vocabulary-table shape that differs from the
    /// freshly built model is an error.
    pub fn load_weights<B: Backend>(
        &self,
        model:  Seq2SeqTransformer<B>,
        stem:   &str,
        device: &B::Device,
    ) -> Result<Seq2SeqTransformer<B>> {
        let path     = self.record_path(stem);
        let expected = model.shape_signature();

        let record = Recorder::<B>::load(&self.recorder, path.clone(), device)
            .with_context(|| format!("Cannot load weights from '{}'", path.display()))?;
        let model = model.load_record(record);

        let found = model.shape_signature();
        if found != expected {
            bail!(
                "Checkpoint '{}' does not match the configured architecture: \
                 expected (params, src_emb, trg_emb, generator) = {:?}, found {:?}",
                path.display(),
                expected,
                found,
            );
        }

        tracing::info!("Restored weights from '{}'", path.display());
        Ok(model)
    }

    /// Record into a temporary stem, then rename over the real file.
    /// An interrupted write leaves the previous record intact.
    fn record_atomic<B: Backend, R: Record<B>>(&self, record: R, stem: &str) -> Result<PathBuf> {
        let path = self.record_path(stem);
        let tmp  = self.record_path(&format!("{stem}{TMP_STEM_SUFFIX}"));

        Recorder::<B>::record(&self.recorder, record, tmp.clone())
            .with_context(|| format!("Failed to save record to '{}'", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Cannot replace '{}'", path.display()))?;
        Ok(path)
    }

    fn save_weights<B: Backend>(&self, model: &Seq2SeqTransformer<B>, stem: &str) -> Result<PathBuf> {
        self.record_atomic::<B, _>(model.clone().into_record(), stem)
    }

    /// Write a best-so-far snapshot named after its validation loss,
    /// then apply the retention policy.
    ///
    /// Returns `None` when the new snapshot itself ranks outside the
    /// `keep_best` lowest losses on disk and was pruned straight away.
    pub fn save_best<B: Backend>(
        &self,
        model:      &Seq2SeqTransformer<B>,
        valid_loss: f64,
    ) -> Result<Option<PathBuf>> {
        let path   = self.save_weights(model, &format!("{BEST_PREFIX}{valid_loss}"))?;
        let pruned = self.prune_best()?;

        if pruned.contains(&path) {
            tracing::info!(
                "Snapshot for val loss {valid_loss} ranks below the {} kept on disk; not kept",
                self.keep_best
            );
            return Ok(None);
        }
        tracing::info!("New best model (val loss {valid_loss}) saved to '{}'", path.display());
        Ok(Some(path))
    }

    /// Best snapshots on disk, lowest loss first.
    pub fn best_checkpoints(&self) -> Result<Vec<(f64, PathBuf)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read '{}'", self.dir.display()))?
        {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let loss = name
                .strip_prefix(BEST_PREFIX)
                .and_then(|rest| rest.strip_suffix(&format!(".{RECORD_EXT}")))
                .and_then(|loss| loss.parse::<f64>().ok());
            if let Some(loss) = loss {
                found.push((loss, path));
            }
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(found)
    }

    /// Delete every best snapshot beyond the `keep_best` lowest losses.
    /// Returns the deleted paths.
    fn prune_best(&self) -> Result<Vec<PathBuf>> {
        if self.keep_best == 0 {
            return Ok(Vec::new());
        }
        let mut pruned = Vec::new();
        for (loss, path) in self.best_checkpoints()?.into_iter().skip(self.keep_best) {
            fs::remove_file(&path)
                .with_context(|| format!("Cannot remove old checkpoint '{}'", path.display()))?;
            tracing::debug!("Pruned checkpoint with val loss {loss}: '{}'", path.display());
            pruned.push(path);
        }
        Ok(pruned)
    }

    /// Files a previous run left in the checkpoint directory: resume
    /// point, scheduler state and best snapshots. A fresh run must start
    /// from an empty directory or retention would rank its snapshots
    /// against someone else's.
    pub fn run_artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut found: Vec<PathBuf> = [
            self.record_path(RESUME_MODEL_STEM),
            self.record_path(RESUME_OPTIM_STEM),
            self.dir.join(SCHEDULER_FILE),
        ]
        .into_iter()
        .filter(|p| p.exists())
        .collect();
        found.extend(self.best_checkpoints()?.into_iter().map(|(_, path)| path));
        Ok(found)
    }

    // ── Resume point ─────────────────────────────────────────────────────────

    /// Rewrite the resume point: current weights and optimizer state.
    pub fn save_resume_point<B, O>(&self, model: &Seq2SeqTransformer<B>, optim: &O) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<Seq2SeqTransformer<B>, B>,
    {
        self.save_weights(model, RESUME_MODEL_STEM)?;
        self.save_optimizer::<B, Seq2SeqTransformer<B>, O>(optim)?;
        tracing::debug!("Resume point written to '{}'", self.dir.display());
        Ok(())
    }

    pub fn save_optimizer<B, M, O>(&self, optim: &O) -> Result<()>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        self.record_atomic::<B, _>(optim.to_record(), RESUME_OPTIM_STEM)
            .context("Failed to save optimizer state")?;
        Ok(())
    }

    /// Restore optimizer state saved with the resume point.
    /// Without a saved state the optimizer is returned unchanged.
    pub fn load_optimizer<B, M, O>(&self, optim: O, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let path = self.record_path(RESUME_OPTIM_STEM);
        if !path.exists() {
            tracing::warn!(
                "No optimizer state at '{}'; Adam moments start from zero",
                path.display()
            );
            return Ok(optim);
        }

        let record = Recorder::<B>::load(&self.recorder, path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state from '{}'", path.display()))?;
        tracing::info!("Restored optimizer state from '{}'", path.display());
        Ok(optim.load_record(record))
    }

    /// Save the learning-rate scheduler so a restart keeps its reduced rate.
    pub fn save_scheduler(&self, scheduler: &PlateauScheduler) -> Result<()> {
        let path = self.dir.join(SCHEDULER_FILE);
        write_atomic(&path, &serde_json::to_string_pretty(scheduler)?)
            .context("Cannot write scheduler state")
    }

    pub fn load_scheduler(&self) -> Result<Option<PlateauScheduler>> {
        let path = self.dir.join(SCHEDULER_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read scheduler state from '{}'", path.display()))?;
        let scheduler = serde_json::from_str(&json)
            .with_context(|| format!("Malformed scheduler state '{}'", path.display()))?;
        Ok(Some(scheduler))
    }

    // ── Run configuration ────────────────────────────────────────────────────

    /// Save the run configuration so the architecture can be rebuilt later.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the configuration saved by a previous run, if any.
    pub fn load_config(&self) -> Result<Option<TrainConfig>> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        let cfg = serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))?;
        Ok(Some(cfg))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::ml::model::Seq2SeqTransformerConfig;

    type TestBackend = NdArray<f32>;

    fn tiny_model(trg_vocab: usize) -> Seq2SeqTransformer<TestBackend> {
        Seq2SeqTransformerConfig::new(12, trg_vocab, 1, 1, 16, 8, 2, 1, 16, 0.0)
            .init(&Default::default())
    }

    #[test]
    fn test_best_snapshot_round_trip() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        let model   = tiny_model(10);

        let path = manager.save_best(&model, 2.4817).unwrap().unwrap();
        assert_eq!(path, tmp.path().join("model-2.4817.mpk"));
        assert!(path.exists());

        let restored = manager
            .load_weights(tiny_model(10), "model-2.4817", &Default::default())
            .unwrap();

        let before: Vec<f32> = model.generator.weight.val().into_data().iter::<f32>().collect();
        let after:  Vec<f32> = restored.generator.weight.val().into_data().iter::<f32>().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_whole_loss_is_named_without_fraction() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        let path    = manager.save_best(&tiny_model(10), 3.0).unwrap().unwrap();

        assert_eq!(path, tmp.path().join("model-3.mpk"));
        assert_eq!(manager.best_checkpoints().unwrap(), vec![(3.0, path)]);
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        manager.save_best(&tiny_model(10), 3.0).unwrap();

        let result = manager.load_weights(tiny_model(14), "model-3", &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        let result  = manager.load_weights(tiny_model(10), RESUME_MODEL_STEM, &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_retention_keeps_lowest_losses() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 2).unwrap();
        let model   = tiny_model(10);

        for loss in [3.5, 3.1, 2.9, 2.75] {
            manager.save_best(&model, loss).unwrap();
        }

        let kept: Vec<f64> = manager
            .best_checkpoints()
            .unwrap()
            .into_iter()
            .map(|(loss, _)| loss)
            .collect();
        assert_eq!(kept, vec![2.75, 2.9]);
    }

    #[test]
    fn test_keep_zero_keeps_everything() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        let model   = tiny_model(10);

        for loss in [3.5, 3.1, 2.9] {
            manager.save_best(&model, loss).unwrap();
        }
        assert_eq!(manager.best_checkpoints().unwrap().len(), 3);
    }

    #[test]
    fn test_resume_model_is_not_a_best_snapshot() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 1).unwrap();
        let model   = tiny_model(10);

        manager.save_weights(&model, RESUME_MODEL_STEM).unwrap();
        manager.save_best(&model, 4.0).unwrap();

        assert!(manager.record_path(RESUME_MODEL_STEM).exists());
        assert_eq!(manager.best_checkpoints().unwrap().len(), 1);
    }

    #[test]
    fn test_worse_snapshot_is_reported_as_not_kept() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 1).unwrap();
        let model   = tiny_model(10);

        assert!(manager.save_best(&model, 2.0).unwrap().is_some());
        assert!(manager.save_best(&model, 3.0).unwrap().is_none());

        let kept: Vec<f64> = manager.best_checkpoints().unwrap().into_iter().map(|(l, _)| l).collect();
        assert_eq!(kept, vec![2.0]);
    }

    #[test]
    fn test_records_leave_no_temporary_files() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 1).unwrap();
        let model   = tiny_model(10);

        manager.save_weights(&model, RESUME_MODEL_STEM).unwrap();
        manager.save_best(&model, 2.5).unwrap();
        manager.save_scheduler(&PlateauScheduler::new(1e-3, 0.5, 1, 0.0)).unwrap();
        // Rewriting replaces the record in place
        manager.save_weights(&model, RESUME_MODEL_STEM).unwrap();

        let leftovers: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "leftover temporary files: {leftovers:?}");
        assert!(manager.load_weights(tiny_model(10), RESUME_MODEL_STEM, &Default::default()).is_ok());
    }

    #[test]
    fn test_run_artifacts_lists_previous_run_files() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        assert!(manager.run_artifacts().unwrap().is_empty());

        // The run config alone is not a leftover; every run rewrites it
        manager.save_config(&TrainConfig::default()).unwrap();
        assert!(manager.run_artifacts().unwrap().is_empty());

        let model = tiny_model(10);
        manager.save_weights(&model, RESUME_MODEL_STEM).unwrap();
        manager.save_best(&model, 0.001).unwrap();
        manager.save_scheduler(&PlateauScheduler::new(1e-3, 0.5, 1, 0.0)).unwrap();

        let mut names: Vec<String> = manager
            .run_artifacts()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["model-0.001.mpk", "model-saved.mpk", "scheduler.json"]);
    }

    #[test]
    fn test_scheduler_round_trip() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 1).unwrap();
        assert!(manager.load_scheduler().unwrap().is_none());

        let mut scheduler = PlateauScheduler::new(1e-3, 0.5, 0, 1e-6);
        scheduler.step(2.0);
        scheduler.step(2.0);
        manager.save_scheduler(&scheduler).unwrap();

        let loaded = manager.load_scheduler().unwrap().unwrap();
        assert_eq!(loaded.lr(), 5e-4);
    }

    #[test]
    fn test_config_round_trip() {
        let tmp     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 1).unwrap();
        assert!(manager.load_config().unwrap().is_none());

        let cfg = TrainConfig { d_model: 64, epochs: 12, ..TrainConfig::default() };
        manager.save_config(&cfg).unwrap();

        let loaded = manager.load_config().unwrap().unwrap();
        assert_eq!(loaded.d_model, 64);
        assert_eq!(loaded.epochs, 12);
    }
}
