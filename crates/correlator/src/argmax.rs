//! Best-candidate reduction shared by every backend

use contracts::{CorrelationOutcome, SearchWindow};

/// Running argmax over candidate scores
///
/// Starts at the sentinel (correlation 0.0 at the window start). A candidate
/// replaces the best only if strictly greater, so NaN never wins and ties keep
/// the earliest offset as long as candidates are observed in offset order.
#[derive(Debug, Clone, Copy)]
pub struct ArgMax {
    outcome: CorrelationOutcome,
}

impl ArgMax {
    pub fn new(window: &SearchWindow) -> Self {
        Self {
            outcome: CorrelationOutcome::sentinel(window),
        }
    }

    #[inline]
    pub fn observe(&mut self, offset: i64, score: f64) {
        if score.is_nan() {
            return;
        }
        self.outcome.overlapping_candidates += 1;
        if score > self.outcome.best_correlation {
            self.outcome.best_correlation = score;
            self.outcome.best_offset = offset;
        }
    }

    /// Fold in a reduction over strictly later offsets
    pub fn merge(&mut self, later: &ArgMax) {
        self.outcome.overlapping_candidates += later.outcome.overlapping_candidates;
        if later.outcome.best_correlation > self.outcome.best_correlation {
            self.outcome.best_correlation = later.outcome.best_correlation;
            self.outcome.best_offset = later.outcome.best_offset;
        }
    }

    pub fn finish(self) -> CorrelationOutcome {
        self.outcome
    }
}

/// Reduce a dense score vector (index 0 = `window.start()`)
pub fn argmax_dense(window: &SearchWindow, scores: &[f64]) -> CorrelationOutcome {
    let mut acc = ArgMax::new(window);
    for (index, &score) in scores.iter().enumerate() {
        acc.observe(window.offset_at(index), score);
    }
    acc.finish()
}
