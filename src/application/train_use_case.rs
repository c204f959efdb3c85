// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run, fresh or resumed, in order:
//
//   Step 1: Recover the loss history      (Layer 6 - infra)
//   Step 2: Load the parallel corpus      (Layer 4 - data)
//   Step 3: Build / load vocabularies     (Layer 6 - infra)
//   Step 4: Encode sentence pairs         (Layer 4 - data)
//   Step 5: Build data loaders            (Layer 4 - data)
//   Step 6: Build the model               (Layer 5 - ml)
//   Step 7: Restore weights and state     (Layer 6 - infra)
//   Step 8: Save config                   (Layer 6 - infra)
//   Step 9: Run the training session      (Layer 5 - ml)
//
// A resumed run picks up the epoch count from the loss history
// and trains only the epochs still missing from the configured
// total. Weights come from `resume_from`; optimizer moments and
// the scheduler's reduced learning rate come from the resume
// point written at the end of every epoch.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    data::dataloader::DataLoaderBuilder,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::Seq2SeqBatcher,
    dataset::{TranslationDataset, TranslationSample},
    loader::ParallelCorpusLoader,
    splitter::split_train_val,
};
use crate::domain::{sentence_pair::SentencePair, traits::CorpusSource};
use crate::infra::{
    checkpoint::{CheckpointManager, RESUME_MODEL_STEM},
    loss_history::LossHistory,
    vocab_store::{VocabStore, Vocabulary},
};
use crate::ml::{
    model::{Seq2SeqTransformer, Seq2SeqTransformerConfig},
    scheduler::PlateauScheduler,
    trainer::{build_optimizer, remaining_epochs, SessionOutcome, TrainingSession},
};

/// File names of the two loss records inside `result_dir`.
pub const TRAIN_LOSS_FILE: &str = "train.txt";
pub const VALID_LOSS_FILE: &str = "test.txt";

// ─── Compute Device ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// GPU through wgpu (Vulkan / Metal / DX12)
    #[default]
    Wgpu,

    /// Plain CPU through ndarray
    Cpu,
}

/// Whether a run continues from the resume point or starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Fresh,
    Resume,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters and paths for a training run.
// Saved next to the checkpoints so a later run can check that it
// rebuilds the same architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    // ── Paths ──
    pub data_dir:       String,
    pub src_ext:        String,
    pub trg_ext:        String,
    pub checkpoint_dir: String,
    pub result_dir:     String,
    pub resume_from:    String,

    // ── Data ──
    pub batch_size:     usize,
    pub max_len:        usize,
    pub min_freq:       usize,
    pub valid_fraction: f64,
    pub split_seed:     u64,
    pub num_workers:    usize,

    // ── Architecture ──
    pub d_model:        usize,
    pub n_layers:       usize,
    pub n_heads:        usize,
    pub ffn_hidden:     usize,
    pub drop_prob:      f64,

    // ── Optimisation ──
    pub init_lr:        f64,
    pub factor:         f64,
    pub adam_eps:       f64,
    pub patience:       usize,
    pub warmup:         usize,
    pub epochs:         usize,
    pub clip:           f64,
    pub weight_decay:   f64,
    pub min_lr:         f64,

    // ── Checkpoints ──
    pub keep_best:      usize,
    pub device:         ComputeDevice,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data".to_string(),
            src_ext:        "de".to_string(),
            trg_ext:        "en".to_string(),
            checkpoint_dir: "saved".to_string(),
            result_dir:     "result".to_string(),
            resume_from:    RESUME_MODEL_STEM.to_string(),

            batch_size:     128,
            max_len:        256,
            min_freq:       2,
            valid_fraction: 0.1,
            split_seed:     42,
            num_workers:    1,

            d_model:        512,
            n_layers:       6,
            n_heads:        8,
            ffn_hidden:     2048,
            drop_prob:      0.1,

            init_lr:        1e-5,
            factor:         0.9,
            adam_eps:       5e-9,
            patience:       10,
            warmup:         100,
            epochs:         1000,
            clip:           1.0,
            weight_decay:   5e-4,
            min_lr:         0.0,

            keep_best:      1,
            device:         ComputeDevice::Wgpu,
        }
    }
}

impl TrainConfig {
    pub fn train_loss_path(&self) -> PathBuf {
        Path::new(&self.result_dir).join(TRAIN_LOSS_FILE)
    }

    pub fn valid_loss_path(&self) -> PathBuf {
        Path::new(&self.result_dir).join(VALID_LOSS_FILE)
    }

    /// Fields that change the shape of the weight record.
    fn architecture(&self) -> (usize, usize, usize, usize, usize) {
        (self.d_model, self.n_layers, self.n_heads, self.ffn_hidden, self.max_len)
    }

    /// Reject settings the model or the loaders cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.n_heads == 0 || self.d_model % self.n_heads != 0 {
            bail!("d_model ({}) must be divisible by n_heads ({})", self.d_model, self.n_heads);
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.max_len < 3 {
            bail!("max_len ({}) must leave room for <sos>, one token and <eos>", self.max_len);
        }
        if !(0.0..1.0).contains(&self.valid_fraction) {
            bail!("valid_fraction ({}) must lie in [0, 1)", self.valid_fraction);
        }
        if !(0.0..1.0).contains(&self.factor) || self.factor == 0.0 {
            bail!("factor ({}) must lie in (0, 1)", self.factor);
        }
        if self.init_lr <= 0.0 {
            bail!("init_lr ({}) must be positive", self.init_lr);
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    mode:   RunMode,
}

/// Summary of a finished run, backend-independent.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub epochs_on_record: usize,
    pub epochs_run:       usize,
    pub best_loss:        f64,
    pub final_lr:         f64,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig, mode: RunMode) -> Self {
        Self { config, mode }
    }

    /// Run on the configured device.
    pub fn execute(&self) -> Result<RunSummary> {
        self.config.validate()?;
        match self.config.device {
            ComputeDevice::Wgpu => self.execute_on::<Autodiff<Wgpu>>(WgpuDevice::default()),
            ComputeDevice::Cpu  => self.execute_on::<Autodiff<NdArray>>(NdArrayDevice::Cpu),
        }
    }

    /// The whole pipeline for one backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 1: Recover the loss history ──────────────────────────────────
        // The number of recorded epochs is the number of completed epochs.
        let history = match self.mode {
            RunMode::Resume => LossHistory::load(cfg.train_loss_path(), cfg.valid_loss_path())?,
            RunMode::Fresh  => {
                let history = LossHistory::load_or_empty(cfg.train_loss_path(), cfg.valid_loss_path())?;
                if !history.is_empty() {
                    bail!(
                        "'{}' already records {} epochs; use `retrain` to continue \
                         or clear the directory to start over",
                        cfg.result_dir,
                        history.len()
                    );
                }
                refuse_stale_artifacts(cfg)?;
                history
            }
        };
        let epochs = remaining_epochs(cfg.epochs, history.len())?;
        tracing::info!("{} epochs on record, {} to go", history.len(), epochs);
        if let Some(best) = history.best_valid() {
            tracing::info!("Best validation loss on record: {best:.4}");
        }

        // ── Step 2: Load the parallel corpus ──────────────────────────────────
        let corpus = ParallelCorpusLoader::new(&cfg.data_dir, &cfg.src_ext, &cfg.trg_ext);
        let (train_pairs, valid_pairs) = load_splits(&corpus, cfg)?;
        tracing::info!("Corpus: {} training pairs, {} validation pairs", train_pairs.len(), valid_pairs.len());

        // ── Step 3: Build / load vocabularies ─────────────────────────────────
        // Built from the training side only, then reused on every restart
        // so token ids stay stable across runs.
        let vocabs    = VocabStore::new(&cfg.checkpoint_dir);
        let src_lines: Vec<&str> = train_pairs.iter().map(|p| p.source.as_str()).collect();
        let trg_lines: Vec<&str> = train_pairs.iter().map(|p| p.target.as_str()).collect();
        let src_vocab = vocabs.load_or_build(&cfg.src_ext, &src_lines, cfg.min_freq)?;
        let trg_vocab = vocabs.load_or_build(&cfg.trg_ext, &trg_lines, cfg.min_freq)?;
        tracing::info!("Vocabulary sizes: {} source, {} target", src_vocab.size(), trg_vocab.size());

        // ── Step 4: Encode sentence pairs ─────────────────────────────────────
        let train_samples = encode_pairs(&train_pairs, &src_vocab, &trg_vocab, cfg.max_len)?;
        let valid_samples = encode_pairs(&valid_pairs, &src_vocab, &trg_vocab, cfg.max_len)?;
        if train_samples.is_empty() {
            bail!("No trainable sentence pairs under '{}'", cfg.data_dir);
        }

        // ── Step 5: Build data loaders ────────────────────────────────────────
        // Training batches carry the autodiff graph; validation batches
        // live on the inner backend like the model returned by valid().
        let src_pad = src_vocab.pad_id;
        let trg_pad = trg_vocab.pad_id;

        let train_dataset = TranslationDataset::new(train_samples);
        let valid_dataset = TranslationDataset::new(valid_samples);
        tracing::info!(
            "Encoded {} training and {} validation samples",
            train_dataset.sample_count(),
            valid_dataset.sample_count()
        );

        let train_loader = DataLoaderBuilder::new(Seq2SeqBatcher::<B>::new(device.clone(), src_pad, trg_pad))
            .batch_size(cfg.batch_size)
            .shuffle(cfg.split_seed)
            .num_workers(cfg.num_workers)
            .build(train_dataset);

        let valid_loader =
            DataLoaderBuilder::new(Seq2SeqBatcher::<B::InnerBackend>::new(device.clone(), src_pad, trg_pad))
                .batch_size(cfg.batch_size)
                .num_workers(cfg.num_workers)
                .build(valid_dataset);

        // ── Step 6: Build the model ───────────────────────────────────────────
        let model_cfg = Seq2SeqTransformerConfig::new(
            src_vocab.size(),
            trg_vocab.size(),
            src_pad as usize,
            trg_pad as usize,
            cfg.max_len,
            cfg.d_model,
            cfg.n_heads,
            cfg.n_layers,
            cfg.ffn_hidden,
            cfg.drop_prob,
        );
        let model: Seq2SeqTransformer<B> = model_cfg.init(&device);
        println!("The model has {} trainable parameters", with_thousands(model.num_params()));

        // ── Step 7: Restore weights and state ─────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir, cfg.keep_best)?;
        let optim       = build_optimizer::<B>(cfg);
        let fresh_scheduler = || PlateauScheduler::new(cfg.init_lr, cfg.factor, cfg.patience, cfg.min_lr);

        let (model, optim, scheduler) = match self.mode {
            RunMode::Fresh => (model, optim, fresh_scheduler()),
            RunMode::Resume => {
                warn_on_config_drift(&checkpoints, cfg)?;
                let model = checkpoints.load_weights(model, &cfg.resume_from, &device)?;

                // Moments and the reduced rate belong to the resume point,
                // not to an older best snapshot.
                if cfg.resume_from == RESUME_MODEL_STEM {
                    let optim = checkpoints.load_optimizer::<B, Seq2SeqTransformer<B>, _>(optim, &device)?;
                    // Running state comes from disk, settings from this invocation
                    let scheduler = match checkpoints.load_scheduler()? {
                        Some(saved) => {
                            tracing::info!("Restored scheduler state (lr={:.3e})", saved.lr());
                            fresh_scheduler().resume_from(&saved)
                        }
                        None => fresh_scheduler(),
                    };
                    (model, optim, scheduler)
                } else {
                    tracing::info!(
                        "Resuming from '{}': optimizer and scheduler start fresh",
                        cfg.resume_from
                    );
                    (model, optim, fresh_scheduler())
                }
            }
        };

        // ── Step 8: Save config ───────────────────────────────────────────────
        checkpoints.save_config(cfg)?;

        // ── Step 9: Run the training session ──────────────────────────────────
        let session = TrainingSession::new(
            model,
            optim,
            scheduler,
            cfg.warmup,
            cfg.clip,
            train_loader,
            valid_loader,
            checkpoints,
            history,
        );
        let epochs_on_record = session.completed_epochs();
        let SessionOutcome { history, best_loss, lr, .. } = session.run(epochs, f64::INFINITY)?;

        Ok(RunSummary {
            epochs_on_record,
            epochs_run: history.len() - epochs_on_record,
            best_loss,
            final_lr: lr,
        })
    }
}

/// A fresh run must not inherit snapshots or vocabularies from an older
/// run: best-snapshot retention would rank them against the new losses
/// and the vocabulary would silently fix the token ids.
fn refuse_stale_artifacts(cfg: &TrainConfig) -> Result<()> {
    let mut stale = CheckpointManager::new(&cfg.checkpoint_dir, cfg.keep_best)?.run_artifacts()?;
    let vocabs = VocabStore::new(&cfg.checkpoint_dir);
    stale.extend([&cfg.src_ext, &cfg.trg_ext].into_iter().filter_map(|ext| vocabs.existing(ext)));

    if !stale.is_empty() {
        let names: Vec<String> = stale.iter().map(|p| p.display().to_string()).collect();
        bail!(
            "'{}' holds files from an earlier run ({}); use `retrain` to continue \
             or clear the directory to start over",
            cfg.checkpoint_dir,
            names.join(", ")
        );
    }
    Ok(())
}

/// Train and validation pairs: the corpus's own validation split when it
/// has one, a seeded held-out slice of train otherwise.
fn load_splits(
    corpus: &dyn CorpusSource,
    cfg:    &TrainConfig,
) -> Result<(Vec<SentencePair>, Vec<SentencePair>)> {
    let train = corpus.load_train()?;
    let split = match corpus.load_valid()? {
        Some(valid) => (train, valid),
        None        => split_train_val(train, cfg.valid_fraction, cfg.split_seed),
    };
    if split.1.is_empty() {
        tracing::warn!("Validation set is empty; validation loss will be NaN");
    }
    Ok(split)
}

/// Encode both sides of every pair and drop pairs the decoder cannot learn from.
fn encode_pairs(
    pairs:     &[SentencePair],
    src_vocab: &Vocabulary,
    trg_vocab: &Vocabulary,
    max_len:   usize,
) -> Result<Vec<TranslationSample>> {
    let mut samples = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let sample = TranslationSample::new(
            src_vocab.encode(&pair.source, max_len)?,
            trg_vocab.encode(&pair.target, max_len)?,
        );
        if sample.is_trainable() {
            samples.push(sample);
        }
    }
    let dropped = pairs.len() - samples.len();
    if dropped > 0 {
        tracing::debug!("Dropped {} untrainable pairs", dropped);
    }
    Ok(samples)
}

/// The saved config describes the run that wrote the checkpoints. An
/// architecture change will fail at load time; say why up front.
fn warn_on_config_drift(checkpoints: &CheckpointManager, cfg: &TrainConfig) -> Result<()> {
    if let Some(saved) = checkpoints.load_config()? {
        if saved.architecture() != cfg.architecture() {
            tracing::warn!(
                "Architecture differs from the saved run: \
                 (d_model, n_layers, n_heads, ffn_hidden, max_len) was {:?}, now {:?}",
                saved.architecture(),
                cfg.architecture()
            );
        }
        if saved.epochs != cfg.epochs {
            tracing::info!("Total epochs changed from {} to {}", saved.epochs, cfg.epochs);
        }
    }
    Ok(())
}

/// 1234567 → "1,234,567"
fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
