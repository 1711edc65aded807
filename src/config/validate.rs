//! Configuration validation.

use crate::cli::validators::parse_duration;
use crate::config::Config;
use crate::constants::threshold;
use crate::error::{Error, Result};

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_defaults(config)?;
    validate_commands(config)?;
    Ok(())
}

fn validate_defaults(config: &Config) -> Result<()> {
    let thresh = config.defaults.thresh;
    if !(threshold::MIN..=threshold::MAX).contains(&thresh) {
        return Err(Error::ConfigValidation {
            message: format!(
                "thresh must be between {} and {}, got {thresh}",
                threshold::MIN,
                threshold::MAX
            ),
        });
    }

    parse_duration(&config.defaults.stale_lock_timeout).map_err(|e| Error::ConfigValidation {
        message: format!("stale_lock_timeout: {e}"),
    })?;
    Ok(())
}

fn validate_commands(config: &Config) -> Result<()> {
    if config.script.path.as_os_str().is_empty() {
        return Err(Error::ConfigValidation {
            message: "script.path must not be empty".to_string(),
        });
    }

    if config
        .script
        .interpreter
        .as_ref()
        .is_some_and(|i| i.trim().is_empty())
    {
        return Err(Error::ConfigValidation {
            message: "script.interpreter must not be empty when set".to_string(),
        });
    }

    if config.validator.command.trim().is_empty() {
        return Err(Error::ConfigValidation {
            message: "validator.command must not be empty".to_string(),
        });
    }

    Ok(())
}
