//! # Correlator
//!
//! Correlation Engine: windowed normalized cross-correlation search between
//! two captured waveforms.
//!
//! Responsibilities:
//! - Per-offset kernels for uniform and sparse time bases
//! - CPU parallel reduction (rayon)
//! - Accelerator offload through a `ComputeDevice`
//! - Capability-gated backend selection with CPU fallback
//!
//! Positive `best_offset` means the secondary lags the primary.

mod accelerator;
mod argmax;
mod backend;
mod cancel;
mod cpu;
mod engine;
mod error;
mod kernel;
mod pair;

pub use accelerator::{
    AcceleratorBackend, ComputeDevice, CorrelationJob, DeviceCapabilities, DeviceInfo,
    SimulatedDevice, WORKGROUP_SIZE,
};
pub use argmax::{argmax_dense, ArgMax};
pub use backend::CorrelationBackend;
pub use cancel::CancelFlag;
pub use cpu::{CpuBackend, DEFAULT_BATCH_SIZE};
pub use engine::{correlate, Correlation, Correlator};
pub use error::CorrelationError;
pub use kernel::{sparse_score, uniform_score, CrossCorrelateArgs};
pub use pair::WaveformPair;
