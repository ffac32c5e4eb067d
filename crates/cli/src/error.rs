//! Error types for CLI operations.

use contracts::ContractError;
use correlator::CorrelationError;
use deskew_engine::SessionError;
use instruments::InstrumentError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Session did not finish in time
    #[error("Session timed out after {seconds}s ({completed}/{required} trials)")]
    Timeout {
        seconds: u64,
        completed: usize,
        required: usize,
    },

    /// Too many consecutive trials failed
    #[error("Giving up after {failures} consecutive failed trials: {last}")]
    TooManyFailures { failures: usize, last: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
