//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::BackendPreference;
use std::path::PathBuf;

/// Scope Deskew - time-skew calibration between two acquisition channels
#[derive(Parser, Debug)]
#[command(
    name = "scope-deskew",
    author,
    version,
    about = "Two-instrument deskew calibration",
    long_about = "Measures the propagation-delay mismatch between two acquisition channels.\n\n\
                  Arms both instruments, cross-correlates each captured pair over a bounded \n\
                  search window, repeats for a number of trials and records the median skew."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SCOPE_DESKEW_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SCOPE_DESKEW_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a calibration session against the simulated instrument pair
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration and device information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "deskew.toml", env = "SCOPE_DESKEW_CONFIG")]
    pub config: PathBuf,

    /// Override the number of trials
    #[arg(long, env = "SCOPE_DESKEW_TRIALS")]
    pub trials: Option<usize>,

    /// Override the search window magnitude (primary samples)
    #[arg(long, env = "SCOPE_DESKEW_MAX_SKEW_SAMPLES")]
    pub max_skew_samples: Option<i64>,

    /// Override the correlation backend
    #[arg(long, value_enum, env = "SCOPE_DESKEW_BACKEND")]
    pub backend: Option<BackendArg>,

    /// Correlate off the control loop
    #[arg(long)]
    pub background: bool,

    /// Compute device attached to the correlator
    #[arg(long, value_enum, default_value = "simulated", env = "SCOPE_DESKEW_DEVICE")]
    pub device: DeviceArg,

    /// Write the calibration table to this JSON file (in-memory only if unset)
    #[arg(short, long, env = "SCOPE_DESKEW_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Session timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "SCOPE_DESKEW_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SCOPE_DESKEW_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "deskew.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "deskew.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Compute device to describe
    #[arg(long, value_enum, default_value = "simulated")]
    pub device: DeviceArg,

    /// Show simulated instrument settings
    #[arg(long)]
    pub simulation: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Correlation backend selection
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    Auto,
    Cpu,
    Accelerator,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Self::Auto,
            BackendArg::Cpu => Self::Cpu,
            BackendArg::Accelerator => Self::Accelerator,
        }
    }
}

/// Compute device
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceArg {
    /// No device; CPU only
    None,
    /// Software device with full capabilities
    #[default]
    Simulated,
    /// Software device without double-precision support
    SimulatedNoFp64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::try_parse_from([
            "scope-deskew",
            "run",
            "--config",
            "lab.toml",
            "--trials",
            "4",
            "--backend",
            "cpu",
            "--device",
            "simulated-no-fp64",
            "--background",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.trials, Some(4));
        assert!(matches!(args.backend, Some(BackendArg::Cpu)));
        assert_eq!(args.device, DeviceArg::SimulatedNoFp64);
        assert!(args.background);
        assert_eq!(args.config, PathBuf::from("lab.toml"));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["scope-deskew", "-q", "-v", "info"]).is_err());
    }
}
