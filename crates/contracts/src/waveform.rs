//! Waveform model - acquisition output
//!
//! Captured signals in one of two time bases. Time is carried as signed
//! femtoseconds (`i64`), amplitudes as `f32`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ContractError;

/// Femtoseconds per second
pub const FS_PER_SECOND: i64 = 1_000_000_000_000_000;

/// Representation tag used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    /// Fixed-rate sampling
    Uniform,
    /// Explicit per-sample offset and duration
    Sparse,
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => write!(f, "uniform"),
            Self::Sparse => write!(f, "sparse"),
        }
    }
}

/// Uniformly sampled waveform
///
/// Sample `i` spans `[i*timescale + trigger_phase, (i+1)*timescale + trigger_phase)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformWaveform {
    timescale: i64,
    trigger_phase: i64,
    samples: Vec<f32>,
}

impl UniformWaveform {
    /// Create a uniform waveform
    ///
    /// # Errors
    /// `timescale` must be positive.
    pub fn new(timescale: i64, trigger_phase: i64, samples: Vec<f32>) -> Result<Self, ContractError> {
        if timescale <= 0 {
            return Err(ContractError::invalid_waveform(format!(
                "timescale must be > 0 fs, got {timescale}"
            )));
        }
        Ok(Self {
            timescale,
            trigger_phase,
            samples,
        })
    }

    /// Femtoseconds per sample
    #[inline]
    pub fn timescale(&self) -> i64 {
        self.timescale
    }

    /// Trigger offset relative to sample 0 (fs)
    #[inline]
    pub fn trigger_phase(&self) -> i64 {
        self.trigger_phase
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Start time of sample `i` (fs)
    #[inline]
    pub fn time_of(&self, i: usize) -> i64 {
        i as i64 * self.timescale + self.trigger_phase
    }

    /// End time of sample `i` (fs, exclusive)
    #[inline]
    pub fn end_time_of(&self, i: usize) -> i64 {
        self.time_of(i) + self.timescale
    }
}

/// Sparsely sampled waveform
///
/// Sample `i` spans `[offsets[i]*timescale + trigger_phase,
/// (offsets[i] + durations[i])*timescale + trigger_phase)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseWaveform {
    timescale: i64,
    trigger_phase: i64,
    offsets: Vec<i64>,
    durations: Vec<i64>,
    samples: Vec<f32>,
}

impl SparseWaveform {
    /// Create a sparse waveform
    ///
    /// # Errors
    /// - `timescale` not positive
    /// - offsets / durations / samples of different length
    /// - negative duration or decreasing offsets
    pub fn new(
        timescale: i64,
        trigger_phase: i64,
        offsets: Vec<i64>,
        durations: Vec<i64>,
        samples: Vec<f32>,
    ) -> Result<Self, ContractError> {
        if timescale <= 0 {
            return Err(ContractError::invalid_waveform(format!(
                "timescale must be > 0 fs, got {timescale}"
            )));
        }
        if offsets.len() != samples.len() || durations.len() != samples.len() {
            return Err(ContractError::invalid_waveform(format!(
                "length mismatch: offsets={}, durations={}, samples={}",
                offsets.len(),
                durations.len(),
                samples.len()
            )));
        }
        if let Some(i) = durations.iter().position(|&d| d < 0) {
            return Err(ContractError::invalid_waveform(format!(
                "negative duration at sample {i}"
            )));
        }
        if let Some(i) = offsets.windows(2).position(|w| w[1] < w[0]) {
            return Err(ContractError::invalid_waveform(format!(
                "offsets decrease at sample {}",
                i + 1
            )));
        }
        Ok(Self {
            timescale,
            trigger_phase,
            offsets,
            durations,
            samples,
        })
    }

    /// Build a sparse view of a uniform waveform (offset `i`, duration 1)
    pub fn from_uniform(uniform: &UniformWaveform) -> Self {
        let len = uniform.len() as i64;
        Self {
            timescale: uniform.timescale,
            trigger_phase: uniform.trigger_phase,
            offsets: (0..len).collect(),
            durations: vec![1; uniform.len()],
            samples: uniform.samples.clone(),
        }
    }

    #[inline]
    pub fn timescale(&self) -> i64 {
        self.timescale
    }

    #[inline]
    pub fn trigger_phase(&self) -> i64 {
        self.trigger_phase
    }

    #[inline]
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    #[inline]
    pub fn durations(&self) -> &[i64] {
        &self.durations
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Start time of sample `i` (fs)
    #[inline]
    pub fn time_of(&self, i: usize) -> i64 {
        self.offsets[i] * self.timescale + self.trigger_phase
    }

    /// End time of sample `i` (fs, exclusive)
    #[inline]
    pub fn end_time_of(&self, i: usize) -> i64 {
        (self.offsets[i] + self.durations[i]) * self.timescale + self.trigger_phase
    }
}

/// Captured waveform in either time base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Waveform {
    Uniform(UniformWaveform),
    Sparse(SparseWaveform),
}

impl Waveform {
    /// Representation tag
    pub fn kind(&self) -> WaveformKind {
        match self {
            Self::Uniform(_) => WaveformKind::Uniform,
            Self::Sparse(_) => WaveformKind::Sparse,
        }
    }

    pub fn timescale(&self) -> i64 {
        match self {
            Self::Uniform(w) => w.timescale(),
            Self::Sparse(w) => w.timescale(),
        }
    }

    pub fn trigger_phase(&self) -> i64 {
        match self {
            Self::Uniform(w) => w.trigger_phase(),
            Self::Sparse(w) => w.trigger_phase(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Uniform(w) => w.len(),
            Self::Sparse(w) => w.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self) -> &[f32] {
        match self {
            Self::Uniform(w) => w.samples(),
            Self::Sparse(w) => w.samples(),
        }
    }

    /// Start time of sample `i` (fs)
    pub fn time_of(&self, i: usize) -> i64 {
        match self {
            Self::Uniform(w) => w.time_of(i),
            Self::Sparse(w) => w.time_of(i),
        }
    }

    /// End time of sample `i` (fs, exclusive)
    pub fn end_time_of(&self, i: usize) -> i64 {
        match self {
            Self::Uniform(w) => w.end_time_of(i),
            Self::Sparse(w) => w.end_time_of(i),
        }
    }

    /// Amplitude of sample `i`
    #[inline]
    pub fn amplitude(&self, i: usize) -> f32 {
        self.samples()[i]
    }
}

impl From<UniformWaveform> for Waveform {
    fn from(w: UniformWaveform) -> Self {
        Self::Uniform(w)
    }
}

impl From<SparseWaveform> for Waveform {
    fn from(w: SparseWaveform) -> Self {
        Self::Sparse(w)
    }
}
