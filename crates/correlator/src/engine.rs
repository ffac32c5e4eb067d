//! Correlation Engine entry points
//!
//! `correlate` runs one explicit backend. `Correlator` owns both backends and
//! picks one per call from the configured preference, device capability and
//! pair representation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BackendKind, BackendPreference, CorrelationConfig, CorrelationOutcome, SearchWindow, Waveform,
};
use tracing::{debug, instrument, warn};

use crate::accelerator::{AcceleratorBackend, ComputeDevice};
use crate::backend::CorrelationBackend;
use crate::cancel::CancelFlag;
use crate::cpu::CpuBackend;
use crate::error::CorrelationError;
use crate::pair::WaveformPair;

/// Correlate `secondary` against `primary` over `window` on `backend`
///
/// # Errors
/// - `UnsupportedRepresentation` for mixed uniform/sparse input
/// - `AcceleratorUnavailable` when an accelerator backend cannot run the pair
pub fn correlate(
    primary: &Waveform,
    secondary: &Waveform,
    window: &SearchWindow,
    backend: &dyn CorrelationBackend,
) -> Result<CorrelationOutcome, CorrelationError> {
    let pair = WaveformPair::new(primary, secondary)?;
    backend.correlate(&pair, window, &CancelFlag::new())
}

/// Result of one engine call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub outcome: CorrelationOutcome,
    pub backend: BackendKind,
    pub elapsed: Duration,
}

/// Backend-selecting Correlation Engine
pub struct Correlator {
    preference: BackendPreference,
    window: SearchWindow,
    cpu: CpuBackend,
    accelerator: Option<AcceleratorBackend>,
}

impl Correlator {
    /// Build from config; no accelerator attached
    pub fn new(config: &CorrelationConfig) -> Result<Self, CorrelationError> {
        let cpu = match config.worker_threads {
            Some(threads) => CpuBackend::with_threads(config.batch_size, threads)?,
            None => CpuBackend::new(config.batch_size),
        };
        Ok(Self {
            preference: config.backend,
            window: config.window(),
            cpu,
            accelerator: None,
        })
    }

    pub fn with_accelerator(mut self, device: Arc<dyn ComputeDevice>) -> Self {
        self.accelerator = Some(AcceleratorBackend::new(device));
        self
    }

    pub fn window(&self) -> &SearchWindow {
        &self.window
    }

    pub fn preference(&self) -> BackendPreference {
        self.preference
    }

    pub fn accelerator(&self) -> Option<&AcceleratorBackend> {
        self.accelerator.as_ref()
    }

    /// Backend that would run `pair`
    pub fn select(&self, pair: &WaveformPair<'_>) -> BackendKind {
        if self.preference == BackendPreference::Cpu {
            return BackendKind::Cpu;
        }

        let Some(accelerator) = &self.accelerator else {
            if self.preference == BackendPreference::Accelerator {
                warn!("accelerator requested but no device attached, using cpu");
            }
            return BackendKind::Cpu;
        };

        match accelerator.check(pair) {
            Ok(()) => BackendKind::Accelerator,
            Err(e) => {
                if self.preference == BackendPreference::Accelerator {
                    warn!(error = %e, "falling back to cpu backend");
                } else {
                    debug!(error = %e, "accelerator not eligible, using cpu");
                }
                BackendKind::Cpu
            }
        }
    }

    fn backend(&self, kind: BackendKind) -> &dyn CorrelationBackend {
        match (kind, &self.accelerator) {
            (BackendKind::Accelerator, Some(accelerator)) => accelerator,
            _ => &self.cpu,
        }
    }

    /// Run one correlation over the configured window
    ///
    /// # Errors
    /// - `UnsupportedRepresentation` for mixed uniform/sparse input
    /// - `Cancelled` when `cancel` fires mid-run
    /// - `Device` when the accelerator fails
    #[instrument(
        name = "correlate",
        skip_all,
        fields(primary = %primary.kind(), secondary = %secondary.kind(), window = self.window.len())
    )]
    pub fn correlate(
        &self,
        primary: &Waveform,
        secondary: &Waveform,
        cancel: &CancelFlag,
    ) -> Result<Correlation, CorrelationError> {
        let pair = WaveformPair::new(primary, secondary)?;
        let kind = self.select(&pair);

        let started = Instant::now();
        let outcome = self.backend(kind).correlate(&pair, &self.window, cancel)?;
        let elapsed = started.elapsed();

        metrics::histogram!("deskew_correlation_seconds", "backend" => kind.as_str())
            .record(elapsed.as_secs_f64());
        debug!(
            backend = %kind,
            best_offset = outcome.best_offset,
            best_correlation = outcome.best_correlation,
            overlapping = outcome.overlapping_candidates,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "correlation complete"
        );

        Ok(Correlation {
            outcome,
            backend: kind,
            elapsed,
        })
    }
}
