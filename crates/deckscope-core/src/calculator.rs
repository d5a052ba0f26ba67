//! Score aggregation.
//!
//! Pure functions with no error conditions: degenerate inputs return the
//! documented defaults.

use deckscope_state::ScoreRecord;

/// Anything that carries a score and a weight.
pub trait Weighted {
    fn score(&self) -> f64;
    fn weight(&self) -> f64;
}

impl Weighted for ScoreRecord {
    fn score(&self) -> f64 {
        self.score
    }

    fn weight(&self) -> f64 {
        self.weight
    }
}

impl Weighted for (f64, f64) {
    fn score(&self) -> f64 {
        self.0
    }

    fn weight(&self) -> f64 {
        self.1
    }
}

/// `round(Σ(score * weight) / Σ(weight))`, or 0 when the total weight is 0.
pub fn weighted_overall<W: Weighted>(scores: &[W]) -> f64 {
    let total_weight: f64 = scores.iter().map(Weighted::weight).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = scores.iter().map(|s| s.score() * s.weight()).sum();
    (weighted_sum / total_weight).round()
}

/// Clamp `score` into `[min, max]`. NaN clamps to `min`.
pub fn clamp(score: f64, min: f64, max: f64) -> f64 {
    if score.is_nan() {
        return min;
    }
    score.max(min).min(max)
}

/// [`clamp`] with the default `[0, 100]` range.
pub fn clamp_score(score: f64) -> f64 {
    clamp(score, 0.0, 100.0)
}

/// Clamp a weight into `[0, 1]`.
pub fn clamp_weight(weight: f64) -> f64 {
    clamp(weight, 0.0, 1.0)
}

/// Percentage of benchmark scores strictly below `score`, rounded.
/// Returns 50 for an empty benchmark.
pub fn percentile_rank(score: f64, benchmark: &[f64]) -> f64 {
    if benchmark.is_empty() {
        return 50.0;
    }
    let below = benchmark.iter().filter(|b| **b < score).count();
    (100.0 * below as f64 / benchmark.len() as f64).round()
}
