//! Session errors

use contracts::{CalibrationState, ChannelId, ContractError};
use correlator::CorrelationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not allowed in the current state
    #[error("cannot {operation} in state '{state}'")]
    InvalidState {
        operation: &'static str,
        state: CalibrationState,
    },

    /// A channel had no capture when the trial was correlated
    #[error("no waveform captured on channel '{channel}'")]
    MissingWaveform { channel: ChannelId },

    /// Aggregation requested before every trial completed
    #[error("session not finished: {completed}/{required} trials")]
    NotFinished { completed: usize, required: usize },

    /// Aggregation over an empty history
    #[error("no trials to aggregate")]
    NoTrials,

    /// Median trial correlation did not exceed the threshold
    #[error("low confidence result: correlation {confidence:.6} <= {threshold:.6}")]
    LowConfidence { confidence: f64, threshold: f64 },

    /// Background correlation task ended without a result
    #[error("background correlation failed: {message}")]
    BackgroundTaskFailed { message: String },

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SessionError {
    pub fn invalid_state(operation: &'static str, state: CalibrationState) -> Self {
        Self::InvalidState { operation, state }
    }

    pub fn background(message: impl Into<String>) -> Self {
        Self::BackgroundTaskFailed {
            message: message.into(),
        }
    }

    /// True when the error ended the session rather than one trial
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Correlation(CorrelationError::Cancelled))
    }
}
