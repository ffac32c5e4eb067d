//! Correlation backend seam

use contracts::{BackendKind, CorrelationOutcome, SearchWindow};

use crate::cancel::CancelFlag;
use crate::error::CorrelationError;
use crate::pair::WaveformPair;

/// An implementation of the windowed correlation search
pub trait CorrelationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Evaluate every offset of `window` and return the best candidate
    ///
    /// # Errors
    /// - `Cancelled` when `cancel` fires before completion
    /// - `AcceleratorUnavailable` / `Device` for accelerator backends
    fn correlate(
        &self,
        pair: &WaveformPair<'_>,
        window: &SearchWindow,
        cancel: &CancelFlag,
    ) -> Result<CorrelationOutcome, CorrelationError>;
}
