use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pricewatch.db?mode=rwc";
const DEFAULT_USER_AGENT: &str = "pricewatch/0.1 (price-aggregation)";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let database_url = or_default("DATABASE_URL", DEFAULT_DATABASE_URL);
    let env = parse_environment(&or_default("PRICEWATCH_ENV", "development"))?;
    let log_level = or_default("PRICEWATCH_LOG_LEVEL", "info");
    let stores_path = PathBuf::from(or_default(
        "PRICEWATCH_STORES_PATH",
        "./config/stores.yaml",
    ));

    let db_max_connections = parse_u32("PRICEWATCH_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("PRICEWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PRICEWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_DB_MIN_CONNECTIONS".to_string(),
            reason: format!("{db_min_connections} exceeds PRICEWATCH_DB_MAX_CONNECTIONS ({db_max_connections})"),
        });
    }

    let http_timeout_secs = parse_u64("PRICEWATCH_HTTP_TIMEOUT_SECS", "30")?;
    let http_user_agent = or_default("PRICEWATCH_HTTP_USER_AGENT", DEFAULT_USER_AGENT);
    let inter_query_delay_ms = parse_u64("PRICEWATCH_INTER_QUERY_DELAY_MS", "1000")?;
    let limit_per_query = parse_usize("PRICEWATCH_LIMIT_PER_QUERY", "50")?;
    if limit_per_query == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_LIMIT_PER_QUERY".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    let html_max_retries = parse_u32("PRICEWATCH_HTML_MAX_RETRIES", "3")?;
    let html_backoff_base_secs = parse_u64("PRICEWATCH_HTML_BACKOFF_BASE_SECS", "1")?;
    let schedule_cron = or_default("PRICEWATCH_SCHEDULE_CRON", "0 0 3 * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        stores_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_user_agent,
        inter_query_delay_ms,
        limit_per_query,
        html_max_retries,
        html_backoff_base_secs,
        schedule_cron,
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
            var: "PRICEWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
