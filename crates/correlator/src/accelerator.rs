//! Accelerator-offloaded backend
//!
//! The device evaluates every candidate offset of a uniform/uniform pair in
//! one batched job and returns the dense score vector. The host then runs the
//! shared argmax. Devices without 64-bit integer or double-precision compute
//! cannot run the kernel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{BackendKind, CorrelationOutcome, SearchWindow};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::argmax::argmax_dense;
use crate::backend::CorrelationBackend;
use crate::cancel::CancelFlag;
use crate::error::CorrelationError;
use crate::kernel::{uniform_score, CrossCorrelateArgs};
use crate::pair::WaveformPair;

/// Invocations per workgroup
pub const WORKGROUP_SIZE: usize = 32;

const SPARSE_UNSUPPORTED: &str = "sparse waveforms are only supported on the cpu backend";

/// Device identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub workgroup_size: usize,
}

/// Device features relevant to the correlation kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub available: bool,
    pub shader_int64: bool,
    pub shader_float64: bool,
}

impl DeviceCapabilities {
    pub fn full() -> Self {
        Self {
            available: true,
            shader_int64: true,
            shader_float64: true,
        }
    }

    /// Reason the kernel cannot run, if any
    pub fn missing(&self) -> Option<&'static str> {
        if !self.available {
            Some("no compute device present")
        } else if !self.shader_int64 {
            Some("device lacks 64-bit integer support")
        } else if !self.shader_float64 {
            Some("device lacks double-precision support")
        } else {
            None
        }
    }

    pub fn supports_correlation(&self) -> bool {
        self.missing().is_none()
    }
}

/// One batched correlation job
#[derive(Debug, Clone, Copy)]
pub struct CorrelationJob<'a> {
    pub args: CrossCorrelateArgs,
    pub primary: &'a [f32],
    pub secondary: &'a [f32],
    /// Number of output slots (one per candidate offset)
    pub output_len: usize,
}

/// Compute device seam
pub trait ComputeDevice: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    fn capabilities(&self) -> DeviceCapabilities;

    /// Execute the job and wait for its output buffer
    fn submit_and_block(&self, job: &CorrelationJob<'_>) -> Result<Vec<f64>, CorrelationError>;
}

/// Software device executing the kernel in workgroups
///
/// Useful for:
/// - hosts without a compute device
/// - testing backend equivalence
/// - exercising capability gating
pub struct SimulatedDevice {
    info: DeviceInfo,
    capabilities: DeviceCapabilities,
    jobs_completed: AtomicU64,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::full())
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            info: DeviceInfo {
                name: "simulated-compute".to_string(),
                vendor: "software".to_string(),
                workgroup_size: WORKGROUP_SIZE,
            },
            capabilities,
            jobs_completed: AtomicU64::new(0),
        }
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDevice for SimulatedDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn submit_and_block(&self, job: &CorrelationJob<'_>) -> Result<Vec<f64>, CorrelationError> {
        if let Some(reason) = self.capabilities.missing() {
            return Err(CorrelationError::accelerator_unavailable(reason));
        }
        if job.args.primary_len != job.primary.len() as u64
            || job.args.secondary_len != job.secondary.len() as u64
        {
            return Err(CorrelationError::device(format!(
                "buffer length mismatch: args ({}, {}) buffers ({}, {})",
                job.args.primary_len,
                job.args.secondary_len,
                job.primary.len(),
                job.secondary.len()
            )));
        }

        let mut output = vec![f64::NAN; job.output_len];
        let group_size = self.info.workgroup_size;
        output
            .par_chunks_mut(group_size)
            .enumerate()
            .for_each(|(group, slots)| {
                for (lane, slot) in slots.iter_mut().enumerate() {
                    let offset = job.args.offset_for(group * group_size + lane);
                    *slot = uniform_score(&job.args, job.primary, job.secondary, offset);
                }
            });

        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        Ok(output)
    }
}

/// Backend dispatching to a `ComputeDevice`
pub struct AcceleratorBackend {
    device: Arc<dyn ComputeDevice>,
    /// One job in flight at a time
    submission: Mutex<()>,
}

impl AcceleratorBackend {
    pub fn new(device: Arc<dyn ComputeDevice>) -> Self {
        Self {
            device,
            submission: Mutex::new(()),
        }
    }

    pub fn device(&self) -> &dyn ComputeDevice {
        self.device.as_ref()
    }

    /// Whether this backend can run `pair`
    pub fn check(&self, pair: &WaveformPair<'_>) -> Result<(), CorrelationError> {
        if let Some(reason) = self.device.capabilities().missing() {
            return Err(CorrelationError::accelerator_unavailable(reason));
        }
        match pair {
            WaveformPair::Uniform { .. } => Ok(()),
            WaveformPair::Sparse { .. } => Err(CorrelationError::accelerator_unavailable(
                SPARSE_UNSUPPORTED,
            )),
        }
    }
}

impl CorrelationBackend for AcceleratorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Accelerator
    }

    #[instrument(
        name = "accelerator_correlate",
        skip_all,
        fields(device = %self.device.info().name, window = window.len())
    )]
    fn correlate(
        &self,
        pair: &WaveformPair<'_>,
        window: &SearchWindow,
        cancel: &CancelFlag,
    ) -> Result<CorrelationOutcome, CorrelationError> {
        self.check(pair)?;
        let (primary, secondary) = match *pair {
            WaveformPair::Uniform { primary, secondary } => (primary, secondary),
            WaveformPair::Sparse { .. } => {
                return Err(CorrelationError::accelerator_unavailable(SPARSE_UNSUPPORTED))
            }
        };

        let job = CorrelationJob {
            args: CrossCorrelateArgs::new(primary, secondary, window.start()),
            primary: primary.samples(),
            secondary: secondary.samples(),
            output_len: window.len(),
        };

        let scores = {
            let _guard = self
                .submission
                .lock()
                .map_err(|_| CorrelationError::device("submission lock poisoned"))?;
            self.device.submit_and_block(&job)?
        };

        if scores.len() != window.len() {
            return Err(CorrelationError::device(format!(
                "device returned {} scores, expected {}",
                scores.len(),
                window.len()
            )));
        }
        // jobs are not interruptible; a late cancel discards the result
        if cancel.is_cancelled() {
            debug!("discarding accelerator result after cancel");
            return Err(CorrelationError::Cancelled);
        }

        Ok(argmax_dense(window, &scores))
    }
}
