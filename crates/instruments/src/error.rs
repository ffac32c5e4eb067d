//! Instrument error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Instrument-layer error
#[derive(Debug, Error)]
pub enum InstrumentError {
    /// Simulation parameters cannot produce a capture
    #[error("invalid simulation: {message}")]
    InvalidSimulation { message: String },

    /// Calibration file could not be read or parsed
    #[error("calibration file '{}': {}", .path.display(), .message)]
    CalibrationFile { path: PathBuf, message: String },

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl InstrumentError {
    pub fn invalid_simulation(message: impl Into<String>) -> Self {
        Self::InvalidSimulation {
            message: message.into(),
        }
    }

    pub fn calibration_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CalibrationFile {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InstrumentError>;
