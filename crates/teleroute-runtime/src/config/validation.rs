//! Configuration validation utilities.

use tracing_subscriber::filter::Directive;

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatchConfig, LogFormat, LogOutput, LoggingConfig, TelerouteConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TelerouteConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    for (target, level) in &logging.filters {
        if target.trim().is_empty() {
            return Err(ConfigError::validation("Log filter target cannot be empty"));
        }
        if target.contains(['=', ',', ' ']) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{target}'"
            )));
        }
        format!("{target}={level}")
            .parse::<Directive>()
            .map_err(|e| {
                ConfigError::validation(format!("Invalid log filter for '{target}': {e}"))
            })?;
    }

    Ok(())
}

fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.poll_interval_secs < 0 {
        return Err(ConfigError::validation(format!(
            "Poll interval must not be negative, got {}",
            dispatch.poll_interval_secs
        )));
    }
    Ok(())
}
