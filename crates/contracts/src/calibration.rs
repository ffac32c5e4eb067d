//! Correlation and calibration results
//!
//! Search window, per-trial outcome and record, session state, final summary.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::InstrumentId;

/// Default search window magnitude (primary samples)
pub const DEFAULT_MAX_SKEW_SAMPLES: i64 = 30_000;

/// Half-open candidate offset range `[-max_skew_samples, +max_skew_samples)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    max_skew_samples: i64,
}

impl SearchWindow {
    /// Create a window; the magnitude is clamped to at least 1 sample.
    pub fn new(max_skew_samples: i64) -> Self {
        Self {
            max_skew_samples: max_skew_samples.max(1),
        }
    }

    #[inline]
    pub fn max_skew_samples(&self) -> i64 {
        self.max_skew_samples
    }

    /// First candidate offset
    #[inline]
    pub fn start(&self) -> i64 {
        -self.max_skew_samples
    }

    /// One past the last candidate offset
    #[inline]
    pub fn end(&self) -> i64 {
        self.max_skew_samples
    }

    /// Number of candidates
    #[inline]
    pub fn len(&self) -> usize {
        (2 * self.max_skew_samples) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, offset: i64) -> bool {
        (self.start()..self.end()).contains(&offset)
    }

    /// Offset of candidate number `index`
    #[inline]
    pub fn offset_at(&self, index: usize) -> i64 {
        self.start() + index as i64
    }

    /// Candidate number of `offset`
    #[inline]
    pub fn index_of(&self, offset: i64) -> Option<usize> {
        self.contains(offset)
            .then(|| (offset - self.start()) as usize)
    }

    pub fn offsets(&self) -> std::ops::Range<i64> {
        self.start()..self.end()
    }
}

impl Default for SearchWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SKEW_SAMPLES)
    }
}

/// Best candidate of one correlation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationOutcome {
    /// Offset in primary samples; positive means the secondary lags
    pub best_offset: i64,
    /// Normalized correlation at `best_offset`
    pub best_correlation: f64,
    /// Candidates that matched at least one sample pair
    pub overlapping_candidates: u64,
}

impl CorrelationOutcome {
    /// Outcome before any candidate has been accepted
    pub fn sentinel(window: &SearchWindow) -> Self {
        Self {
            best_offset: window.start(),
            best_correlation: 0.0,
            overlapping_candidates: 0,
        }
    }
}

/// Which correlation implementation produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Cpu,
    Accelerator,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accelerator => "accelerator",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed acquire/correlate cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial number (0-based, equals history index)
    pub trial: usize,
    /// Measured skew (fs)
    pub skew_fs: i64,
    /// Normalized correlation of the best candidate
    pub correlation: f64,
    /// Best offset in primary samples
    pub best_offset: i64,
    /// Backend that ran the correlation
    pub backend: BackendKind,
    /// Wall time spent correlating (ms)
    pub elapsed_ms: f64,
}

/// Calibration session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    /// Configuration, nothing armed yet
    Setup,
    /// Waiting for a new acquisition
    Acquire,
    /// Correlation of the current trial in progress
    Correlate,
    /// All trials completed
    Done,
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "setup",
            Self::Acquire => "acquire",
            Self::Correlate => "correlate",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Aggregated result of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    /// Instrument the skew applies to
    pub instrument: InstrumentId,
    /// Median of the per-trial skews (fs)
    pub median_skew_fs: i64,
    /// Correlation of the median trial
    pub confidence: f64,
    /// Confidence did not exceed the configured threshold
    pub low_confidence: bool,
    /// Number of trials aggregated
    pub trials: usize,
}
