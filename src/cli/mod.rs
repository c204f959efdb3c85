// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   starts a run from scratch
//   2. `retrain` resumes from the saved resume point
//
// Running the binary with no subcommand is `retrain` with
// every flag at its default.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs};

use crate::application::train_use_case::{RunMode, RunSummary, TrainUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "seq2seq-retrain",
    version = "0.1.0",
    about = "Train or resume training of an encoder-decoder transformer on a parallel corpus."
)]
pub struct Cli {
    /// train or retrain; defaults to retrain
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Route the subcommand to the training use case.
    pub fn run(self) -> Result<()> {
        let (args, mode) = match self.command {
            Some(Commands::Train(args))   => (args, RunMode::Fresh),
            Some(Commands::Retrain(args)) => (args, RunMode::Resume),
            None                          => (TrainArgs::default(), RunMode::Resume),
        };
        run_training(args, mode)
    }
}

fn run_training(args: TrainArgs, mode: RunMode) -> Result<()> {
    tracing::info!(
        "{} on '{}' ({} → {})",
        match mode { RunMode::Fresh => "Training", RunMode::Resume => "Retraining" },
        args.data_dir,
        args.src_ext,
        args.trg_ext,
    );

    let use_case = TrainUseCase::new(args.into(), mode);
    let summary  = use_case.execute()?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.epochs_run == 0 {
        println!(
            "Nothing to do: {} epochs already on record.",
            summary.epochs_on_record
        );
        return;
    }
    println!(
        "Training complete. {} epochs run ({} total), best validation loss {:.3}, lr {:.3e}.",
        summary.epochs_run,
        summary.epochs_on_record + summary.epochs_run,
        summary.best_loss,
        summary.final_lr,
    );
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{ComputeDevice, TrainConfig};

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["seq2seq-retrain"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["seq2seq-retrain", "retrain"]).unwrap();
        let Some(Commands::Retrain(args)) = cli.command else { panic!("expected retrain") };

        let from_cli: TrainConfig = args.into();
        let default = TrainConfig::default();
        assert_eq!(from_cli.epochs, default.epochs);
        assert_eq!(from_cli.init_lr, default.init_lr);
        assert_eq!(from_cli.resume_from, default.resume_from);
        assert_eq!(from_cli.d_model, default.d_model);
        assert_eq!(from_cli.device, default.device);
    }

    #[test]
    fn test_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "seq2seq-retrain", "train",
            "--epochs", "5",
            "--resume-from", "model-2.5",
            "--device", "cpu",
        ])
        .unwrap();
        let Some(Commands::Train(args)) = cli.command else { panic!("expected train") };

        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, 5);
        assert_eq!(cfg.resume_from, "model-2.5");
        assert_eq!(cfg.device, ComputeDevice::Cpu);
    }
}
