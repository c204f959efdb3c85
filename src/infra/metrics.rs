// ============================================================
// Layer 6 — Epoch Metrics
// ============================================================
// Everything the driver reports about one finished epoch.
//
// Metrics per epoch:
//   - epoch:      absolute epoch number, counting resumed ones
//   - train_loss: mean cross-entropy over all training batches
//   - valid_loss: mean cross-entropy over the validation set
//   - elapsed:    wall time of train + validation
//
// Perplexity is exp(loss), the usual way to read a token-level
// cross-entropy: a perplexity of 20 means the model is as
// unsure as a uniform pick among 20 tokens.
//
// Example report:
//   Epoch: 38 | Time: 4m 12s
//       Train Loss: 2.315 | Train PPL:  10.125
//        Val. Loss: 2.501 |  Val. PPL:  12.194

use std::time::Duration;

/// exp(loss)
pub fn perplexity(loss: f64) -> f64 {
    loss.exp()
}

/// Split an elapsed duration into whole minutes and leftover seconds.
pub fn epoch_time(elapsed: Duration) -> (u64, u64) {
    let secs = elapsed.as_secs();
    (secs / 60, secs % 60)
}

/// One finished epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// Absolute epoch number (starts at 1, includes resumed epochs)
    pub epoch: usize,

    /// Mean loss over all training batches
    pub train_loss: f64,

    /// Mean loss over all validation batches
    pub valid_loss: f64,

    /// Train + validation wall time
    pub elapsed: Duration,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, valid_loss: f64, elapsed: Duration) -> Self {
        Self { epoch, train_loss, valid_loss, elapsed }
    }

    /// True when this epoch's validation loss is strictly below the best so far.
    /// A tie is not an improvement, and NaN never is.
    pub fn is_improvement(&self, best_valid_loss: f64) -> bool {
        self.valid_loss < best_valid_loss
    }

    /// The three-line epoch summary printed after each epoch.
    pub fn report(&self) -> String {
        let (mins, secs) = epoch_time(self.elapsed);
        format!(
            "Epoch: {} | Time: {}m {}s\n\
             \tTrain Loss: {:.3} | Train PPL: {:7.3}\n\
             \t Val. Loss: {:.3} |  Val. PPL: {:7.3}",
            self.epoch,
            mins,
            secs,
            self.train_loss,
            perplexity(self.train_loss),
            self.valid_loss,
            perplexity(self.valid_loss),
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement_is_strict() {
        let first = EpochMetrics::new(1, 3.0, 2.5, Duration::ZERO);
        // Any finite loss beats the initial infinity
        assert!(first.is_improvement(f64::INFINITY));

        let second = EpochMetrics::new(2, 2.8, 2.6, Duration::ZERO);
        assert!(!second.is_improvement(2.5));

        // Equal is not better
        let tie = EpochMetrics::new(3, 2.7, 2.5, Duration::ZERO);
        assert!(!tie.is_improvement(2.5));

        let diverged = EpochMetrics::new(4, f64::NAN, f64::NAN, Duration::ZERO);
        assert!(!diverged.is_improvement(f64::INFINITY));
    }

    #[test]
    fn test_epoch_time_split() {
        assert_eq!(epoch_time(Duration::from_secs(252)), (4, 12));
        assert_eq!(epoch_time(Duration::from_millis(59_999)), (0, 59));
    }

    #[test]
    fn test_perplexity() {
        assert_eq!(perplexity(0.0), 1.0);
        assert!((perplexity(2.0_f64.ln()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_contains_offset_epoch_and_ppl() {
        let m      = EpochMetrics::new(38, 2.0_f64.ln(), 0.0, Duration::from_secs(61));
        let report = m.report();
        assert!(report.starts_with("Epoch: 38 | Time: 1m 1s"));
        assert!(report.contains("Train PPL:   2.000"));
        assert!(report.contains("Val. PPL:   1.000"));
    }
}
