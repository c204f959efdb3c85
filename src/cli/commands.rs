// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `retrain`, and the
// flags they share. Every flag defaults to the value a
// `train` run uses, so `retrain` with no flags picks up
// exactly where the last default run stopped.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use crate::application::train_use_case::{ComputeDevice, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new training run from randomly initialised weights
    Train(TrainArgs),

    /// Continue training from the saved resume point
    Retrain(TrainArgs),
}

/// Backend used for tensor work.
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum DeviceArg {
    /// GPU through wgpu
    #[default]
    Wgpu,

    /// CPU through ndarray
    Cpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Wgpu => ComputeDevice::Wgpu,
            DeviceArg::Cpu  => ComputeDevice::Cpu,
        }
    }
}

/// Arguments shared by `train` and `retrain`.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Directory holding train.{src} / train.{trg} and optionally val.*
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// File extension of the source language
    #[arg(long, default_value = "de")]
    pub src_ext: String,

    /// File extension of the target language
    #[arg(long, default_value = "en")]
    pub trg_ext: String,

    /// Directory for weights, optimizer state and vocabularies
    #[arg(long, default_value = "saved")]
    pub checkpoint_dir: String,

    /// Directory for the train.txt / test.txt loss records
    #[arg(long, default_value = "result")]
    pub result_dir: String,

    /// Checkpoint stem to restore weights from, e.g. model-saved or model-4.2311
    #[arg(long, default_value = "model-saved")]
    pub resume_from: String,

    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,

    /// Longest encoded sentence, <sos> and <eos> included
    #[arg(long, default_value_t = 256)]
    pub max_len: usize,

    /// Words seen fewer times than this map to <unk>
    #[arg(long, default_value_t = 2)]
    pub min_freq: usize,

    /// Share of train held out when the corpus has no val split
    #[arg(long, default_value_t = 0.1)]
    pub valid_fraction: f64,

    /// Seed for the held-out split and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub split_seed: u64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 512)]
    pub d_model: usize,

    /// Encoder and decoder layers each
    #[arg(long, default_value_t = 6)]
    pub n_layers: usize,

    /// Attention heads; must divide d_model
    #[arg(long, default_value_t = 8)]
    pub n_heads: usize,

    /// Inner dimension of the feed-forward blocks
    #[arg(long, default_value_t = 2048)]
    pub ffn_hidden: usize,

    #[arg(long, default_value_t = 0.1)]
    pub drop_prob: f64,

    /// Learning rate before any plateau reduction
    #[arg(long, default_value_t = 1e-5)]
    pub init_lr: f64,

    /// Multiplier applied to the learning rate on a plateau
    #[arg(long, default_value_t = 0.9)]
    pub factor: f64,

    #[arg(long, default_value_t = 5e-9)]
    pub adam_eps: f64,

    /// Epochs without improvement before the rate is reduced
    #[arg(long, default_value_t = 10)]
    pub patience: usize,

    /// Epochs of this invocation before the scheduler starts stepping
    #[arg(long, default_value_t = 100)]
    pub warmup: usize,

    /// Total epochs across all runs, history included
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,

    /// Gradient norm clipping threshold
    #[arg(long, default_value_t = 1.0)]
    pub clip: f64,

    #[arg(long, default_value_t = 5e-4)]
    pub weight_decay: f64,

    /// Floor for the learning rate
    #[arg(long, default_value_t = 0.0)]
    pub min_lr: f64,

    /// Best-loss snapshots to keep; 0 keeps all of them
    #[arg(long, default_value_t = 1)]
    pub keep_best: usize,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

impl Default for TrainArgs {
    fn default() -> Self {
        TrainConfig::default().into()
    }
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            src_ext:        a.src_ext,
            trg_ext:        a.trg_ext,
            checkpoint_dir: a.checkpoint_dir,
            result_dir:     a.result_dir,
            resume_from:    a.resume_from,
            batch_size:     a.batch_size,
            max_len:        a.max_len,
            min_freq:       a.min_freq,
            valid_fraction: a.valid_fraction,
            split_seed:     a.split_seed,
            num_workers:    a.num_workers,
            d_model:        a.d_model,
            n_layers:       a.n_layers,
            n_heads:        a.n_heads,
            ffn_hidden:     a.ffn_hidden,
            drop_prob:      a.drop_prob,
            init_lr:        a.init_lr,
            factor:         a.factor,
            adam_eps:       a.adam_eps,
            patience:       a.patience,
            warmup:         a.warmup,
            epochs:         a.epochs,
            clip:           a.clip,
            weight_decay:   a.weight_decay,
            min_lr:         a.min_lr,
            keep_best:      a.keep_best,
            device:         a.device.into(),
        }
    }
}

impl From<TrainConfig> for TrainArgs {
    fn from(c: TrainConfig) -> Self {
        TrainArgs {
            data_dir:       c.data_dir,
            src_ext:        c.src_ext,
            trg_ext:        c.trg_ext,
            checkpoint_dir: c.checkpoint_dir,
            result_dir:     c.result_dir,
            resume_from:    c.resume_from,
            batch_size:     c.batch_size,
            max_len:        c.max_len,
            min_freq:       c.min_freq,
            valid_fraction: c.valid_fraction,
            split_seed:     c.split_seed,
            num_workers:    c.num_workers,
            d_model:        c.d_model,
            n_layers:       c.n_layers,
            n_heads:        c.n_heads,
            ffn_hidden:     c.ffn_hidden,
            drop_prob:      c.drop_prob,
            init_lr:        c.init_lr,
            factor:         c.factor,
            adam_eps:       c.adam_eps,
            patience:       c.patience,
            warmup:         c.warmup,
            epochs:         c.epochs,
            clip:           c.clip,
            weight_decay:   c.weight_decay,
            min_lr:         c.min_lr,
            keep_best:      c.keep_best,
            device:         match c.device {
                ComputeDevice::Wgpu => DeviceArg::Wgpu,
                ComputeDevice::Cpu  => DeviceArg::Cpu,
            },
        }
    }
}
