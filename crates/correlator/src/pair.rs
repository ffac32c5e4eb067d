//! Same-representation waveform pair

use contracts::{SparseWaveform, UniformWaveform, Waveform, WaveformKind};

use crate::error::CorrelationError;
use crate::kernel::{sparse_score, uniform_score, CrossCorrelateArgs};

/// Primary/secondary pair borrowed for one correlation call
///
/// Only same-variant pairs can be constructed.
#[derive(Debug, Clone, Copy)]
pub enum WaveformPair<'a> {
    Uniform {
        primary: &'a UniformWaveform,
        secondary: &'a UniformWaveform,
    },
    Sparse {
        primary: &'a SparseWaveform,
        secondary: &'a SparseWaveform,
    },
}

impl<'a> WaveformPair<'a> {
    /// # Errors
    /// `UnsupportedRepresentation` when the variants differ
    pub fn new(primary: &'a Waveform, secondary: &'a Waveform) -> Result<Self, CorrelationError> {
        match (primary, secondary) {
            (Waveform::Uniform(primary), Waveform::Uniform(secondary)) => {
                Ok(Self::Uniform { primary, secondary })
            }
            (Waveform::Sparse(primary), Waveform::Sparse(secondary)) => {
                Ok(Self::Sparse { primary, secondary })
            }
            _ => Err(CorrelationError::UnsupportedRepresentation {
                primary: primary.kind(),
                secondary: secondary.kind(),
            }),
        }
    }

    pub fn kind(&self) -> WaveformKind {
        match self {
            Self::Uniform { .. } => WaveformKind::Uniform,
            Self::Sparse { .. } => WaveformKind::Sparse,
        }
    }

    /// Primary sample period (fs)
    pub fn primary_timescale(&self) -> i64 {
        match self {
            Self::Uniform { primary, .. } => primary.timescale(),
            Self::Sparse { primary, .. } => primary.timescale(),
        }
    }

    /// Normalized correlation at `offset` (NaN without overlap)
    #[inline]
    pub fn score(&self, offset: i64) -> f64 {
        match self {
            Self::Uniform { primary, secondary } => {
                let args = CrossCorrelateArgs::new(primary, secondary, 0);
                uniform_score(&args, primary.samples(), secondary.samples(), offset)
            }
            Self::Sparse { primary, secondary } => sparse_score(primary, secondary, offset),
        }
    }
}
