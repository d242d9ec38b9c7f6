use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment, ScheduleSettings, TransformSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(var, format!("expected a boolean, got \"{raw}\""))),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("TGWH_ENV", "development"))?;
    let log_level = or_default("TGWH_LOG_LEVEL", "info");
    let base_path = PathBuf::from(or_default("TGWH_BASE_PATH", "data"));
    let channels_path = PathBuf::from(or_default("TGWH_CHANNELS_PATH", "./config/channels.yaml"));

    let db_max_connections = parse_u32("TGWH_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("TGWH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("TGWH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let source_url = or_default("TGWH_SOURCE_URL", "http://127.0.0.1:8081");
    let source_token = lookup("TGWH_SOURCE_TOKEN").ok().filter(|t| !t.is_empty());
    let source_timeout_secs = parse_u64("TGWH_SOURCE_TIMEOUT_SECS", "30")?;
    let source_user_agent = or_default("TGWH_SOURCE_USER_AGENT", "tgwh/0.1 (channel-collector)");

    let message_limit = parse_usize("TGWH_MESSAGE_LIMIT", "1000")?;
    let message_delay_ms = parse_u64("TGWH_MESSAGE_DELAY_MS", "1000")?;
    let channel_delay_ms = parse_u64("TGWH_CHANNEL_DELAY_MS", "3000")?;
    let max_flood_waits = parse_u32("TGWH_MAX_FLOOD_WAITS", "5")?;
    let max_flood_wait_secs = parse_u64("TGWH_MAX_FLOOD_WAIT_SECS", "900")?;

    let detector_url = or_default("TGWH_DETECTOR_URL", "http://127.0.0.1:8090");
    let detector_timeout_secs = parse_u64("TGWH_DETECTOR_TIMEOUT_SECS", "60")?;
    let confidence_threshold = parse_confidence(&or_default("TGWH_CONFIDENCE_THRESHOLD", "0.25"))?;

    let transform = TransformSettings {
        program: or_default("TGWH_TRANSFORM_PROGRAM", "dbt"),
        args: or_default("TGWH_TRANSFORM_ARGS", "run")
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        project_dir: PathBuf::from(or_default(
            "TGWH_TRANSFORM_PROJECT_DIR",
            "./medical_warehouse",
        )),
        timeout_secs: parse_u64("TGWH_TRANSFORM_TIMEOUT_SECS", "600")?,
    };

    let schedule = ScheduleSettings {
        cron: or_default("TGWH_SCHEDULE_CRON", "0 0 2 * * *"),
        enabled: parse_bool("TGWH_SCHEDULE_ENABLED", "false")?,
    };

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        base_path,
        channels_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        source_url,
        source_token,
        source_timeout_secs,
        source_user_agent,
        message_limit,
        message_delay_ms,
        channel_delay_ms,
        max_flood_waits,
        max_flood_wait_secs,
        detector_url,
        detector_timeout_secs,
        confidence_threshold,
        transform,
        schedule,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TGWH_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn parse_confidence(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "TGWH_CONFIDENCE_THRESHOLD".to_string(),
        reason,
    };
    let value = raw.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{value} is outside [0, 1]")));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
