// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Used only when the corpus ships without a validation split.
//
// A resumed run must evaluate on exactly the same held-out
// pairs as the run it continues, otherwise the loss history
// would mix two different validation sets. The shuffle is
// therefore driven by a seeded StdRng instead of thread_rng:
// same seed + same corpus → same split on every restart.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with a fixed seed and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `valid_fraction` - Proportion held out for validation, e.g. 0.1 = 10%
/// * `seed`           - Shuffle seed; keep it fixed across restarts
pub fn split_train_val<T>(
    mut samples:    Vec<T>,
    valid_fraction: f64,
    seed:           u64,
) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let n_valid  = ((total as f64) * valid_fraction).round() as usize;
    let split_at = total - n_valid.min(total);

    // split_off(n) leaves [0..n) in `samples` and returns [n..total)
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}
