//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use super::device_capabilities;
use crate::calibration::format_skew;
use crate::cli::InfoArgs;
use correlator::{ComputeDevice, SimulatedDevice};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    session: SessionInfo,
    correlation: CorrelationInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<DeviceReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<contracts::SimulationConfig>,
}

#[derive(Serialize)]
struct SessionInfo {
    primary_channel: String,
    secondary_channel: String,
    instrument: String,
    trials: usize,
    background: bool,
    poll_interval_ms: u64,
    min_correlation: f64,
}

#[derive(Serialize)]
struct CorrelationInfo {
    backend: contracts::BackendPreference,
    window_start: i64,
    window_end: i64,
    candidates: usize,
    /// Window span in fs, when the primary timescale is known
    #[serde(skip_serializing_if = "Option::is_none")]
    window_span_fs: Option<i64>,
    batch_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    worker_threads: Option<usize>,
}

#[derive(Serialize)]
struct DeviceReport {
    name: String,
    vendor: String,
    workgroup_size: usize,
    shader_int64: bool,
    shader_float64: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    unavailable_reason: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &contracts::DeskewConfig, args: &InfoArgs) -> ConfigInfo {
    let window = config.correlation.window();
    let window_span_fs = config
        .simulation
        .as_ref()
        .map(|sim| window.max_skew_samples() * sim.primary_timescale_fs);

    let device = device_capabilities(args.device).map(|capabilities| {
        let device = SimulatedDevice::with_capabilities(capabilities);
        let info = device.info();
        DeviceReport {
            name: info.name.clone(),
            vendor: info.vendor.clone(),
            workgroup_size: info.workgroup_size,
            shader_int64: capabilities.shader_int64,
            shader_float64: capabilities.shader_float64,
            unavailable_reason: capabilities.missing().map(str::to_string),
        }
    });

    ConfigInfo {
        version: format!("{:?}", config.version),
        session: SessionInfo {
            primary_channel: config.session.primary_channel.to_string(),
            secondary_channel: config.session.secondary_channel.to_string(),
            instrument: config.session.target_instrument().to_string(),
            trials: config.session.trials,
            background: config.session.background,
            poll_interval_ms: config.session.poll_interval_ms,
            min_correlation: config.aggregation.min_correlation,
        },
        correlation: CorrelationInfo {
            backend: config.correlation.backend,
            window_start: window.start(),
            window_end: window.end(),
            candidates: window.len(),
            window_span_fs,
            batch_size: config.correlation.batch_size,
            worker_threads: config.correlation.worker_threads,
        },
        device,
        simulation: if args.simulation {
            config.simulation.clone()
        } else {
            None
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Scope Deskew Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let session = &info.session;
    println!("📍 Session");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Primary: {}", session.primary_channel);
    println!("   ├─ Secondary: {}", session.secondary_channel);
    println!("   ├─ Instrument: {}", session.instrument);
    println!("   ├─ Trials: {}", session.trials);
    println!(
        "   ├─ Mode: {}",
        if session.background { "background" } else { "inline" }
    );
    println!("   ├─ Poll interval: {} ms", session.poll_interval_ms);
    println!("   └─ Min correlation: {}", session.min_correlation);

    let correlation = &info.correlation;
    println!("\n⚙️  Correlation");
    println!("   ├─ Backend: {:?}", correlation.backend);
    println!(
        "   ├─ Window: [{}, {}) samples, {} candidates",
        correlation.window_start, correlation.window_end, correlation.candidates
    );
    if let Some(span) = correlation.window_span_fs {
        println!("   ├─ Window span: +/- {}", format_skew(span));
    }
    match correlation.worker_threads {
        Some(threads) => println!("   ├─ Worker threads: {}", threads),
        None => println!("   ├─ Worker threads: global pool"),
    }
    println!("   └─ Batch size: {}", correlation.batch_size);

    match &info.device {
        Some(device) => {
            println!("\n🖥️  Compute Device");
            println!("   ├─ Name: {} ({})", device.name, device.vendor);
            println!("   ├─ Workgroup size: {}", device.workgroup_size);
            println!("   ├─ 64-bit integers: {}", device.shader_int64);
            println!("   ├─ Double precision: {}", device.shader_float64);
            match &device.unavailable_reason {
                Some(reason) => println!("   └─ Status: unavailable ({})", reason),
                None => println!("   └─ Status: ready"),
            }
        }
        None => println!("\n🖥️  Compute Device: none (cpu only)"),
    }

    if let Some(sim) = &info.simulation {
        println!("\n🧪 Simulation");
        println!("   ├─ Skew: {} (+/- {})", format_skew(sim.skew_fs), format_skew(sim.jitter_fs));
        println!("   ├─ Samples: {}", sim.samples);
        println!(
            "   ├─ Timescales: {} / {} fs",
            sim.primary_timescale_fs, sim.secondary_timescale_fs
        );
        println!(
            "   ├─ Trigger phases: {} / {} fs",
            sim.primary_trigger_phase_fs, sim.secondary_trigger_phase_fs
        );
        println!("   ├─ Noise: {}", sim.noise);
        println!("   └─ Representation: {}", if sim.sparse { "sparse" } else { "uniform" });
    }

    println!();
}
