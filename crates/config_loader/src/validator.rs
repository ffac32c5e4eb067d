//! Config validation
//!
//! Rules:
//! - numeric ranges (derived `Validate` on the contract structs)
//! - channel ids non-empty and distinct
//! - simulated skew inside the search window

use contracts::{ContractError, DeskewConfig};
use validator::Validate;

/// Validate a DeskewConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &DeskewConfig) -> Result<(), ContractError> {
    validate_ranges(config)?;
    validate_channels(config)?;
    validate_simulation(config)?;
    Ok(())
}

fn validate_ranges(config: &DeskewConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("config", e.to_string()))
}

fn validate_channels(config: &DeskewConfig) -> Result<(), ContractError> {
    let session = &config.session;

    if session.primary_channel.is_empty() {
        return Err(ContractError::config_validation(
            "session.primary_channel",
            "channel id cannot be empty",
        ));
    }
    if session.secondary_channel.is_empty() {
        return Err(ContractError::config_validation(
            "session.secondary_channel",
            "channel id cannot be empty",
        ));
    }
    if session.primary_channel == session.secondary_channel {
        return Err(ContractError::config_validation(
            "session.secondary_channel",
            format!(
                "secondary channel must differ from primary ('{}')",
                session.primary_channel
            ),
        ));
    }
    if let Some(ref instrument) = session.secondary_instrument {
        if instrument.is_empty() {
            return Err(ContractError::config_validation(
                "session.secondary_instrument",
                "instrument id cannot be empty",
            ));
        }
    }
    Ok(())
}

/// The simulated skew must be findable by the configured window
fn validate_simulation(config: &DeskewConfig) -> Result<(), ContractError> {
    let Some(ref sim) = config.simulation else {
        return Ok(());
    };

    let reach_fs = config
        .correlation
        .max_skew_samples
        .saturating_mul(sim.primary_timescale_fs);
    let worst_fs = sim.skew_fs.abs().saturating_add(sim.jitter_fs);
    if worst_fs >= reach_fs {
        return Err(ContractError::config_validation(
            "simulation.skew_fs",
            format!(
                "|skew| + jitter ({worst_fs} fs) exceeds search window reach ({reach_fs} fs)"
            ),
        ));
    }
    Ok(())
}
