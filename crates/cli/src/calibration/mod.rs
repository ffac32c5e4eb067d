//! Calibration host - drives a deskew session against the simulated scope pair.

mod runner;
mod stats;

pub use runner::{CalibrationRunner, RunnerConfig};
pub use stats::{format_skew, RunStats};
