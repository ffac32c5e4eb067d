//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::device_capabilities;
use crate::calibration::{CalibrationRunner, RunnerConfig};
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_calibration(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(trials) = args.trials {
        info!(trials, "Overriding trial count from CLI");
        config.session.trials = trials;
    }
    if let Some(max) = args.max_skew_samples {
        info!(max_skew_samples = max, "Overriding search window from CLI");
        config.correlation.max_skew_samples = max;
    }
    if let Some(backend) = args.backend {
        info!(?backend, "Overriding correlation backend from CLI");
        config.correlation.backend = backend.into();
    }
    if args.background {
        config.session.background = true;
    }

    // Overrides go through the same checks as the file
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    if config.simulation.is_none() {
        warn!("No [simulation] section, using default simulated instruments");
    }

    info!(
        primary = %config.session.primary_channel,
        secondary = %config.session.secondary_channel,
        instrument = %config.session.target_instrument(),
        trials = config.session.trials,
        max_skew_samples = config.correlation.max_skew_samples,
        backend = ?config.correlation.backend,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let runner_config = RunnerConfig {
        device: device_capabilities(args.device),
        output: args.output.clone(),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        ..RunnerConfig::new(config)
    };

    let stats = CalibrationRunner::new(runner_config)
        .run(shutdown_signal())
        .await
        .context("Calibration failed")?;

    stats.print_summary();

    match &stats.summary {
        Some(summary) if summary.low_confidence => anyhow::bail!(
            "Calibration confidence {:.4} did not exceed the threshold",
            summary.confidence
        ),
        Some(summary) => {
            info!(
                instrument = %summary.instrument,
                skew_fs = summary.median_skew_fs,
                duration_secs = stats.duration.as_secs_f64(),
                "Calibration completed successfully"
            );
        }
        None => warn!("Calibration cancelled, nothing written"),
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &contracts::DeskewConfig) {
    let window = config.correlation.window();

    println!("\n=== Configuration Summary ===\n");
    println!("Session:");
    println!("  Primary: {}", config.session.primary_channel);
    println!("  Secondary: {}", config.session.secondary_channel);
    println!("  Instrument: {}", config.session.target_instrument());
    println!("  Trials: {}", config.session.trials);
    println!("  Background: {}", config.session.background);

    println!("\nCorrelation:");
    println!(
        "  Window: [{}, {}) ({} candidates)",
        window.start(),
        window.end(),
        window.len()
    );
    println!("  Backend: {:?}", config.correlation.backend);
    println!("  Min correlation: {}", config.aggregation.min_correlation);

    if let Some(sim) = &config.simulation {
        println!("\nSimulation:");
        println!("  Skew: {} fs (+/- {} fs)", sim.skew_fs, sim.jitter_fs);
        println!("  Samples: {}", sim.samples);
        println!(
            "  Timescales: {} / {} fs",
            sim.primary_timescale_fs, sim.secondary_timescale_fs
        );
        println!("  Sparse: {}", sim.sparse);
    }

    println!();
}
