// ============================================================
// Layer 5 — Reduce-on-Plateau Learning Rate Scheduler
// ============================================================
// Lowers the learning rate when the validation loss stops
// improving.
//
//   improved  ⇔  loss < best × (1 − threshold)
//
// Every non-improving step increments a counter; once the
// counter exceeds `patience` the rate is multiplied by
// `factor`, floored at `min_lr`, and the counter resets.
//
// Burn's optimizer takes the learning rate as an argument to
// every `step`, so the scheduler only has to hand out the
// current value.

use serde::{Deserialize, Serialize};

/// Relative margin a loss must beat the best by to count as better.
const DEFAULT_THRESHOLD: f64 = 1e-4;

/// Reductions smaller than this are skipped.
const MIN_DELTA: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauScheduler {
    lr:             f64,
    factor:         f64,
    patience:       usize,
    min_lr:         f64,
    threshold:      f64,
    /// None until the first loss arrives (JSON has no infinity)
    best:           Option<f64>,
    num_bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(init_lr: f64, factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            lr: init_lr,
            factor,
            patience,
            min_lr,
            threshold: DEFAULT_THRESHOLD,
            best: None,
            num_bad_epochs: 0,
        }
    }

    /// Current learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Carry over the running state of a saved scheduler: current rate,
    /// best loss and bad-epoch count. Factor, patience and the rate floor
    /// stay as configured here, so a restart can change them.
    pub fn resume_from(mut self, saved: &PlateauScheduler) -> Self {
        if (saved.factor, saved.patience, saved.min_lr) != (self.factor, self.patience, self.min_lr) {
            tracing::info!(
                "Scheduler settings changed since the last run: factor {} → {}, \
                 patience {} → {}, min_lr {:e} → {:e}",
                saved.factor, self.factor,
                saved.patience, self.patience,
                saved.min_lr, self.min_lr,
            );
        }
        self.lr             = saved.lr.max(self.min_lr);
        self.best           = saved.best;
        self.num_bad_epochs = saved.num_bad_epochs;
        self
    }

    /// Feed one validation loss and return the learning rate to use next.
    pub fn step(&mut self, metric: f64) -> f64 {
        let best = self.best.unwrap_or(f64::INFINITY);
        if metric < best * (1.0 - self.threshold) {
            self.best = Some(metric);
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs > self.patience {
            self.reduce();
            self.num_bad_epochs = 0;
        }

        self.lr
    }

    fn reduce(&mut self) {
        let new_lr = (self.lr * self.factor).max(self.min_lr);
        if self.lr - new_lr > MIN_DELTA {
            tracing::info!("Reducing learning rate: {:.4e} → {:.4e}", self.lr, new_lr);
            self.lr = new_lr;
        }
    }
}

/// The scheduler is only stepped once the loop index is past warmup.
/// warmup = 5 → no step for indices 0..=5, steps from index 6 on.
pub fn scheduler_due(step: usize, warmup: usize) -> bool {
    step > warmup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_gate() {
        for step in 0..=5 {
            assert!(!scheduler_due(step, 5), "step {step} should be in warmup");
        }
        assert!(scheduler_due(6, 5));
        assert!(scheduler_due(100, 5));
    }

    #[test]
    fn test_resume_keeps_progress_but_takes_new_settings() {
        let mut saved = PlateauScheduler::new(1e-3, 0.9, 100, 0.0);
        saved.step(2.0);
        saved.step(2.0);

        let mut resumed = PlateauScheduler::new(1e-2, 0.5, 0, 0.0).resume_from(&saved);
        assert_eq!(resumed.lr(), 1e-3);

        // Patience 0 and factor 0.5 apply right away; best 2.0 came along
        assert_eq!(resumed.step(2.0), 5e-4);
        assert_eq!(resumed.step(2.0), 2.5e-4);
    }

    #[test]
    fn test_resume_respects_new_floor() {
        let saved   = PlateauScheduler::new(1e-6, 0.5, 1, 0.0);
        let resumed = PlateauScheduler::new(1e-3, 0.5, 1, 1e-5).resume_from(&saved);
        assert_eq!(resumed.lr(), 1e-5);
    }

    #[test]
    fn test_improving_loss_keeps_rate() {
        let mut s = PlateauScheduler::new(1e-3, 0.5, 1, 1e-6);
        for loss in [3.0, 2.5, 2.0, 1.5] {
            assert_eq!(s.step(loss), 1e-3);
        }
    }

    #[test]
    fn test_reduces_after_patience_exceeded() {
        let mut s = PlateauScheduler::new(1e-3, 0.5, 2, 1e-6);
        s.step(2.0);
        // Two bad steps are tolerated
        assert_eq!(s.step(2.1), 1e-3);
        assert_eq!(s.step(2.2), 1e-3);
        // The third one triggers a reduction
        assert_eq!(s.step(2.3), 5e-4);
        // Counter was reset
        assert_eq!(s.step(2.4), 5e-4);
    }

    #[test]
    fn test_tiny_improvement_counts_as_plateau() {
        let mut s = PlateauScheduler::new(1.0, 0.1, 0, 0.0);
        s.step(2.0);
        // 2.0 * (1 - 1e-4) = 1.9998, so 1.99999 is not better
        assert!((s.step(1.99999) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_floored_at_min_lr() {
        let mut s = PlateauScheduler::new(1e-3, 0.1, 0, 5e-4);
        s.step(1.0);
        assert_eq!(s.step(1.0), 5e-4);
        assert_eq!(s.step(1.0), 5e-4);
    }

    #[test]
    fn test_fresh_state_survives_json() {
        let s    = PlateauScheduler::new(1e-3, 0.5, 2, 1e-6);
        let json = serde_json::to_string(&s).unwrap();
        let back: PlateauScheduler = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lr(), 1e-3);
    }
}
