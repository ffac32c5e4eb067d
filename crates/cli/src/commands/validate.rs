//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    primary_channel: String,
    secondary_channel: String,
    instrument: String,
    trials: usize,
    max_skew_samples: i64,
    backend: String,
    simulated: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    primary_channel: config.session.primary_channel.to_string(),
                    secondary_channel: config.session.secondary_channel.to_string(),
                    instrument: config.session.target_instrument().to_string(),
                    trials: config.session.trials,
                    max_skew_samples: config.correlation.max_skew_samples,
                    backend: format!("{:?}", config.correlation.backend),
                    simulated: config.simulation.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &contracts::DeskewConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.simulation.is_none() {
        warnings.push("No [simulation] section - `run` will use default simulated instruments".to_string());
    }

    if config.session.trials % 2 == 0 {
        warnings.push(format!(
            "session.trials = {} is even - the median averages the two central trials",
            config.session.trials
        ));
    }

    if config.aggregation.min_correlation <= 0.0 {
        warnings.push("aggregation.min_correlation is 0 - any positive correlation is accepted".to_string());
    }

    if let Some(sim) = &config.simulation {
        if sim.sparse && config.correlation.backend == contracts::BackendPreference::Accelerator {
            warnings.push("Sparse simulation with backend = accelerator - every trial falls back to cpu".to_string());
        }
        if sim.primary_timescale_fs != sim.secondary_timescale_fs {
            warnings.push(format!(
                "Timescales differ ({} / {} fs) - skew resolution is one primary sample",
                sim.primary_timescale_fs, sim.secondary_timescale_fs
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Primary: {}", summary.primary_channel);
            println!("  Secondary: {} ({})", summary.secondary_channel, summary.instrument);
            println!("  Trials: {}", summary.trials);
            println!("  Window: +/- {} samples", summary.max_skew_samples);
            println!("  Backend: {}", summary.backend);
            println!("  Simulated: {}", summary.simulated);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config(
            r#"
[session]
primary_channel = "scope1/CH1"
secondary_channel = "scope2/CH1"
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("[simulation]")));
        assert!(warnings.iter().any(|w| w.contains("even")));
        assert_eq!(result.summary.unwrap().instrument, "scope2");
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/deskew.toml"),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_same_channel_invalid() {
        let file = write_config(
            r#"
[session]
primary_channel = "scope1/CH1"
secondary_channel = "scope1/CH1"
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("must differ"));
    }
}
