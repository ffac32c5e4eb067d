//! # Instruments
//!
//! Collaborators of a deskew session.
//!
//! - `SimulatedScopePair`: trigger control plus acquisition into the
//!   `WaveformStore`, for hosts without hardware
//! - `MemoryCalibrationSink` / `JsonFileCalibrationSink`: where the final
//!   skew is recorded

mod error;
mod sim;
mod sinks;

pub use error::{InstrumentError, Result};
pub use sim::{SimulatedScopePair, SimulationFaults};
pub use sinks::{CalibrationEntry, CalibrationTable, JsonFileCalibrationSink, MemoryCalibrationSink};
