// ============================================================
// Layer 5 — Training Loop
// ============================================================
// One epoch = one pass of Training Step over the training
// loader followed by one pass of Evaluation Step over the
// validation loader.
//
// Burn specifics:
//   - Training runs on an AutodiffBackend; gradients come from
//     loss.backward() and are fresh for every batch, so there
//     is nothing to zero between steps
//   - model.valid() returns the model on B::InnerBackend with
//     dropout off and no autodiff graph (no_grad equivalent)
//   - The validation loader must batch on the inner backend too
//   - Adam is functional: optim.step(lr, model, grads) returns
//     the updated model. Gradients are clipped to one global
//     norm across all parameters just before the step
//
// TrainingSession is the explicit training state: model,
// optimizer, scheduler, loaders, checkpoint manager and the
// recovered loss history, built once by `new` and consumed by
// `run`.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use std::{sync::Arc, time::Instant};
use burn::{
    data::dataloader::{DataLoader, DataLoaderIterator},
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::Seq2SeqBatch;
use crate::infra::{
    checkpoint::CheckpointManager,
    loss_history::LossHistory,
    metrics::EpochMetrics,
};
use crate::ml::grad_clip::clip_grad_norm;
use crate::ml::model::Seq2SeqTransformer;
use crate::ml::scheduler::{scheduler_due, PlateauScheduler};

/// Epochs still to run: configured total minus epochs already on record.
pub fn remaining_epochs(total_epochs: usize, completed: usize) -> Result<usize> {
    if completed > total_epochs {
        bail!(
            "Loss history already holds {completed} epochs, more than the configured \
             total of {total_epochs}; raise --epochs to continue training"
        );
    }
    Ok(total_epochs - completed)
}

/// Adam with L2 weight decay. Clipping happens in `train_epoch`.
pub fn build_optimizer<B: AutodiffBackend>(
    cfg: &TrainConfig,
) -> impl Optimizer<Seq2SeqTransformer<B>, B> {
    AdamConfig::new()
        .with_epsilon(cfg.adam_eps as f32)
        .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)))
        .init::<B, Seq2SeqTransformer<B>>()
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { done as f64 * 100.0 / total as f64 }
}

/// Batches paired with the share of items processed before each one,
/// so the first batch reports 0 %.
fn batches_with_progress<'a, O: 'a>(loader: &'a dyn DataLoader<O>) -> impl Iterator<Item = (f64, O)> + 'a {
    let mut iter = loader.iter();
    std::iter::from_fn(move || {
        let progress = iter.progress();
        let batch    = iter.next()?;
        Some((percent(progress.items_processed, progress.items_total), batch))
    })
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

// ─── Training Step ────────────────────────────────────────────────────────────
/// One pass over `loader`, updating the model after every batch.
/// Gradients are clipped to a global norm of `clip` before each step.
/// Returns the updated model and the mean batch loss.
pub fn train_epoch<B, O>(
    mut model: Seq2SeqTransformer<B>,
    loader:    &dyn DataLoader<Seq2SeqBatch<B>>,
    optim:     &mut O,
    lr:        f64,
    clip:      f64,
) -> (Seq2SeqTransformer<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<Seq2SeqTransformer<B>, B>,
{
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;

    for (done, batch) in batches_with_progress(loader) {
        let loss     = model.forward_loss(batch.src, batch.trg);
        let loss_val = loss.clone().into_scalar().elem::<f64>();
        loss_sum += loss_val;
        batches  += 1;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        let (grads, _) = clip_grad_norm::<B, _>(&model, grads, clip);
        model = optim.step(lr, model, grads);

        println!("step : {:.2} % , loss : {}", done, loss_val);
    }

    (model, mean(loss_sum, batches))
}

// ─── Evaluation Step ──────────────────────────────────────────────────────────
/// Mean batch loss over `loader` without touching the weights.
/// Pass `model.valid()` so no autodiff graph is built.
pub fn evaluate<B: Backend>(
    model:  &Seq2SeqTransformer<B>,
    loader: &dyn DataLoader<Seq2SeqBatch<B>>,
) -> f64 {
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;

    for batch in loader.iter() {
        loss_sum += model
            .forward_loss(batch.src, batch.trg)
            .into_scalar()
            .elem::<f64>();
        batches += 1;
    }

    mean(loss_sum, batches)
}

// ─── Training Session ─────────────────────────────────────────────────────────
pub struct TrainingSession<B: AutodiffBackend, O> {
    model:        Seq2SeqTransformer<B>,
    optim:        O,
    scheduler:    PlateauScheduler,
    warmup:       usize,
    clip:         f64,
    train_loader: Arc<dyn DataLoader<Seq2SeqBatch<B>>>,
    valid_loader: Arc<dyn DataLoader<Seq2SeqBatch<B::InnerBackend>>>,
    checkpoints:  CheckpointManager,
    history:      LossHistory,
}

/// What a finished run leaves behind. The weights are on disk.
pub struct SessionOutcome {
    pub history:   LossHistory,
    pub best_loss: f64,
    pub lr:        f64,
}

impl<B, O> TrainingSession<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Seq2SeqTransformer<B>, B>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model:        Seq2SeqTransformer<B>,
        optim:        O,
        scheduler:    PlateauScheduler,
        warmup:       usize,
        clip:         f64,
        train_loader: Arc<dyn DataLoader<Seq2SeqBatch<B>>>,
        valid_loader: Arc<dyn DataLoader<Seq2SeqBatch<B::InnerBackend>>>,
        checkpoints:  CheckpointManager,
        history:      LossHistory,
    ) -> Self {
        Self { model, optim, scheduler, warmup, clip, train_loader, valid_loader, checkpoints, history }
    }

    /// Epochs already on record when the session started.
    pub fn completed_epochs(&self) -> usize {
        self.history.len()
    }

    /// Run `total_epoch` more epochs. A new best snapshot is written
    /// whenever validation loss drops strictly below `best_loss`.
    ///
    /// Per epoch, the resume point and scheduler state are written before
    /// the loss history. The history length is what a restart trusts, so
    /// it never claims an epoch whose weights are not on disk yet.
    pub fn run(self, total_epoch: usize, mut best_loss: f64) -> Result<SessionOutcome> {
        let Self {
            mut model,
            mut optim,
            mut scheduler,
            warmup,
            clip,
            train_loader,
            valid_loader,
            checkpoints,
            mut history,
        } = self;

        let resumed = history.len();
        tracing::info!(
            "Running {} epochs after {} on record (lr={:.3e})",
            total_epoch,
            resumed,
            scheduler.lr()
        );

        for step in 0..total_epoch {
            let start = Instant::now();

            let (trained, train_loss) =
                train_epoch(model, train_loader.as_ref(), &mut optim, scheduler.lr(), clip);
            model = trained;
            let valid_loss = evaluate(&model.valid(), valid_loader.as_ref());

            let metrics = EpochMetrics::new(resumed + step + 1, train_loss, valid_loss, start.elapsed());

            if scheduler_due(step, warmup) {
                if valid_loss.is_finite() {
                    scheduler.step(valid_loss);
                } else {
                    tracing::warn!("Validation loss is not finite; skipping scheduler step");
                }
            }

            history.push(train_loss, valid_loss);

            if metrics.is_improvement(best_loss) {
                best_loss = valid_loss;
                checkpoints.save_best(&model, valid_loss)?;
            }

            checkpoints.save_resume_point(&model, &optim)?;
            checkpoints.save_scheduler(&scheduler)?;
            history.save()?;

            println!("{}", metrics.report());
        }

        tracing::info!("Training complete! Best validation loss: {best_loss}");
        Ok(SessionOutcome { history, best_loss, lr: scheduler.lr() })
    }
}
