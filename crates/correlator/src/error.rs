//! Correlation errors

use contracts::WaveformKind;
use thiserror::Error;

/// Correlation Engine error
#[derive(Debug, Error)]
pub enum CorrelationError {
    /// Primary and secondary use different time bases
    #[error("unsupported representation pair: primary is {primary}, secondary is {secondary}")]
    UnsupportedRepresentation {
        primary: WaveformKind,
        secondary: WaveformKind,
    },

    /// Accelerator cannot run this job
    #[error("accelerator unavailable: {reason}")]
    AcceleratorUnavailable { reason: String },

    /// Device reported a failure while executing a job
    #[error("device error: {message}")]
    Device { message: String },

    /// Dedicated CPU pool could not be built
    #[error("thread pool error: {message}")]
    ThreadPool { message: String },

    /// Cancelled before all candidates were evaluated
    #[error("correlation cancelled")]
    Cancelled,
}

impl CorrelationError {
    pub fn accelerator_unavailable(reason: impl Into<String>) -> Self {
        Self::AcceleratorUnavailable {
            reason: reason.into(),
        }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }
}
