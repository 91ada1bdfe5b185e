//! Cross-field validation applied before a snapshot becomes live.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AdminConfig, AnnounceConfig, AppConfig, ClientConfig};

/// Longest duration accepted for any `announce` setting: one week.
pub const MAX_DURATION_SECS: u64 = 7 * 86_400;

/// Validate a complete configuration document.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate_config(config: &AppConfig) -> ConfigResult<()> {
    config.upload_rate_bounds()?;
    validate_ratio_target(config.upload_ratio_target)?;
    validate_client(&config.client)?;
    validate_announce(&config.announce)?;
    validate_admin(&config.admin)?;
    if config.telemetry.log_level.trim().is_empty() {
        return Err(ConfigError::InvalidField {
            section: "telemetry",
            field: "log_level",
            value: None,
            reason: "must not be empty",
        });
    }
    Ok(())
}

fn validate_ratio_target(value: f64) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::invalid(
            "root",
            "upload_ratio_target",
            value,
            "must be a finite number",
        ));
    }
    if value < 0.0 {
        return Err(ConfigError::invalid(
            "root",
            "upload_ratio_target",
            value,
            "must be greater than or equal to zero",
        ));
    }
    Ok(())
}

fn validate_client(client: &ClientConfig) -> ConfigResult<()> {
    if client.port == 0 {
        return Err(ConfigError::invalid(
            "client",
            "port",
            client.port,
            "must be between 1 and 65535",
        ));
    }
    Ok(())
}

fn validate_announce(announce: &AnnounceConfig) -> ConfigResult<()> {
    let positive = [
        (
            "min_announce_interval_secs",
            announce.min_announce_interval_secs,
        ),
        ("retry_base_secs", announce.retry_base_secs),
        ("retry_max_interval_secs", announce.retry_max_interval_secs),
        ("request_timeout_secs", announce.request_timeout_secs),
        ("stop_timeout_secs", announce.stop_timeout_secs),
        (
            "speed_refresh_interval_secs",
            announce.speed_refresh_interval_secs,
        ),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ConfigError::invalid(
                "announce",
                field,
                value,
                "must be greater than zero",
            ));
        }
    }
    let bounded = positive
        .into_iter()
        .chain([("shutdown_grace_secs", announce.shutdown_grace_secs)]);
    for (field, value) in bounded {
        if value > MAX_DURATION_SECS {
            return Err(ConfigError::invalid(
                "announce",
                field,
                value,
                "must not exceed one week",
            ));
        }
    }
    if announce.retry_max_interval_secs < announce.retry_base_secs {
        return Err(ConfigError::invalid(
            "announce",
            "retry_max_interval_secs",
            announce.retry_max_interval_secs,
            "must be greater than or equal to retry_base_secs",
        ));
    }
    Ok(())
}

fn validate_admin(admin: &AdminConfig) -> ConfigResult<()> {
    if admin.enabled && admin.port == 0 {
        return Err(ConfigError::invalid(
            "admin",
            "port",
            admin.port,
            "must be between 1 and 65535",
        ));
    }
    Ok(())
}
