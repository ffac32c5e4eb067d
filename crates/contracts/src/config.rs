//! DeskewConfig - Config Loader output
//!
//! Session, correlation, aggregation and (optional) simulated-instrument
//! settings. Every section has defaults so a minimal file only names the
//! two channels.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ChannelId, InstrumentId, SearchWindow, DEFAULT_MAX_SKEW_SAMPLES};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete deskew configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DeskewConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub correlation: CorrelationConfig,

    #[serde(default)]
    #[validate(nested)]
    pub aggregation: AggregationConfig,

    /// Simulated instrument pair (CLI `run` only)
    #[serde(default)]
    #[validate(nested)]
    pub simulation: Option<SimulationConfig>,
}

/// Calibration session settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    /// Channel of the primary (reference) instrument
    pub primary_channel: ChannelId,

    /// Channel of the instrument being deskewed
    pub secondary_channel: ChannelId,

    /// Calibration table key; defaults to the secondary channel's instrument
    #[serde(default)]
    pub secondary_instrument: Option<InstrumentId>,

    /// Number of acquire/correlate trials
    #[serde(default = "default_trials")]
    #[validate(range(min = 1, max = 1000))]
    pub trials: usize,

    /// Run correlations off the control loop
    #[serde(default)]
    pub background: bool,

    /// Host loop tick period (ms)
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
}

fn default_trials() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    20
}

impl SessionConfig {
    /// Instrument key the final skew is recorded under
    pub fn target_instrument(&self) -> InstrumentId {
        self.secondary_instrument
            .clone()
            .or_else(|| self.secondary_channel.instrument())
            .unwrap_or_else(|| InstrumentId::new(self.secondary_channel.as_str()))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            primary_channel: ChannelId::new("scope1/CH1"),
            secondary_channel: ChannelId::new("scope2/CH1"),
            secondary_instrument: None,
            trials: default_trials(),
            background: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Backend choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Accelerator when capable and the pair is uniform, CPU otherwise
    #[default]
    Auto,
    /// Always CPU
    Cpu,
    /// Accelerator, falling back to CPU when unavailable
    Accelerator,
}

/// Correlation engine settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CorrelationConfig {
    /// Search window magnitude (primary samples)
    #[serde(default = "default_max_skew_samples")]
    #[validate(range(min = 1, max = 100_000_000))]
    pub max_skew_samples: i64,

    #[serde(default)]
    pub backend: BackendPreference,

    /// Candidate offsets per CPU work item (cancellation granularity)
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Dedicated CPU pool size (None = global rayon pool)
    #[serde(default)]
    #[validate(range(min = 1))]
    pub worker_threads: Option<usize>,
}

fn default_max_skew_samples() -> i64 {
    DEFAULT_MAX_SKEW_SAMPLES
}

fn default_batch_size() -> usize {
    256
}

impl CorrelationConfig {
    pub fn window(&self) -> SearchWindow {
        SearchWindow::new(self.max_skew_samples)
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_skew_samples: default_max_skew_samples(),
            backend: BackendPreference::default(),
            batch_size: default_batch_size(),
            worker_threads: None,
        }
    }
}

/// Result aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AggregationConfig {
    /// The median trial's correlation must exceed this value
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub min_correlation: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_correlation: 0.0,
        }
    }
}

/// Simulated instrument pair
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    /// Primary sample period (fs)
    #[serde(default = "default_timescale_fs")]
    #[validate(range(min = 1))]
    pub primary_timescale_fs: i64,

    /// Secondary sample period (fs)
    #[serde(default = "default_timescale_fs")]
    #[validate(range(min = 1))]
    pub secondary_timescale_fs: i64,

    #[serde(default)]
    pub primary_trigger_phase_fs: i64,

    #[serde(default)]
    pub secondary_trigger_phase_fs: i64,

    /// Samples per capture (both channels)
    #[serde(default = "default_samples")]
    #[validate(range(min = 16))]
    pub samples: usize,

    /// True delay of the secondary relative to the primary (fs)
    #[serde(default = "default_skew_fs")]
    pub skew_fs: i64,

    /// Per-acquisition uniform skew jitter, +/- (fs)
    #[serde(default)]
    #[validate(range(min = 0))]
    pub jitter_fs: i64,

    /// Additive noise amplitude
    #[serde(default = "default_noise")]
    #[validate(range(min = 0.0))]
    pub noise: f32,

    /// Calibration pattern symbol period (fs)
    #[serde(default = "default_symbol_period_fs")]
    #[validate(range(min = 1))]
    pub symbol_period_fs: i64,

    /// Publish sparse waveforms instead of uniform ones
    #[serde(default)]
    pub sparse: bool,

    /// Host ticks between arming and data arrival
    #[serde(default = "default_arrival_delay_ticks")]
    pub arrival_delay_ticks: u32,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_timescale_fs() -> i64 {
    // 1 GS/s
    1_000_000
}

fn default_samples() -> usize {
    20_000
}

fn default_skew_fs() -> i64 {
    12_000_000
}

fn default_noise() -> f32 {
    0.05
}

fn default_symbol_period_fs() -> i64 {
    8_000_000
}

fn default_arrival_delay_ticks() -> u32 {
    1
}

fn default_seed() -> u64 {
    0x5eed
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            primary_timescale_fs: default_timescale_fs(),
            secondary_timescale_fs: default_timescale_fs(),
            primary_trigger_phase_fs: 0,
            secondary_trigger_phase_fs: 0,
            samples: default_samples(),
            skew_fs: default_skew_fs(),
            jitter_fs: 0,
            noise: default_noise(),
            symbol_period_fs: default_symbol_period_fs(),
            sparse: false,
            arrival_delay_ticks: default_arrival_delay_ticks(),
            seed: default_seed(),
        }
    }
}
