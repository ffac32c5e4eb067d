//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the deskew workspace.
//! Business crates only depend on this crate, never on each other's internals.
//!
//! ## Time Model
//! - All times are signed femtoseconds (`i64`)
//! - A sample's time is `index * timescale + trigger_phase` (uniform) or
//!   `offset * timescale + trigger_phase` (sparse)
//! - Arrival signatures are only compared for equality

mod calibration;
mod collaborator;
mod config;
mod error;
mod ids;
mod store;
mod waveform;

pub use calibration::*;
pub use collaborator::{CalibrationSink, TriggerControl};
pub use config::*;
pub use error::*;
pub use ids::{ChannelId, InstrumentId};
pub use store::{ArrivalSignature, Capture, WaveformStore};
pub use waveform::*;
