//! Layered error definitions
//!
//! Categorized by source: config / waveform / collaborator / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Waveform Errors =====
    /// Waveform construction rejected
    #[error("invalid waveform: {message}")]
    InvalidWaveform { message: String },

    // ===== Collaborator Errors =====
    /// Trigger subsystem refused to arm
    #[error("trigger '{source_name}' failed to arm: {message}")]
    TriggerArm {
        source_name: String,
        message: String,
    },

    /// Waveform store lock poisoned by a panicking writer
    #[error("waveform store poisoned")]
    StorePoisoned,

    // ===== Sink Errors =====
    /// Calibration sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid waveform error
    pub fn invalid_waveform(message: impl Into<String>) -> Self {
        Self::InvalidWaveform {
            message: message.into(),
        }
    }

    /// Create trigger arm error
    pub fn trigger_arm(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TriggerArm {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
