use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

fn assert_invalid(map: &HashMap<&str, &str>, expected_var: &str) {
    let result = build_app_config(lookup_from_map(map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == expected_var),
        "expected InvalidEnvVar({expected_var}), got: {result:?}"
    );
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_test() {
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PRICEWATCH_ENV"));
}

#[test]
fn build_app_config_uses_defaults_for_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.database_url, "sqlite://data/pricewatch.db?mode=rwc");
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.stores_path, PathBuf::from("./config/stores.yaml"));
    assert_eq!(cfg.db_max_connections, 5);
    assert_eq!(cfg.db_min_connections, 1);
    assert_eq!(cfg.db_acquire_timeout_secs, 10);
    assert_eq!(cfg.http_timeout_secs, 30);
    assert_eq!(cfg.http_user_agent, "pricewatch/0.1 (price-aggregation)");
    assert_eq!(cfg.inter_query_delay_ms, 1000);
    assert_eq!(cfg.limit_per_query, 50);
    assert_eq!(cfg.html_max_retries, 3);
    assert_eq!(cfg.html_backoff_base_secs, 1);
    assert_eq!(cfg.schedule_cron, "0 0 3 * * *");
}

#[test]
fn build_app_config_reads_overrides() {
    let mut map = HashMap::new();
    map.insert("DATABASE_URL", "sqlite::memory:");
    map.insert("PRICEWATCH_ENV", "production");
    map.insert("PRICEWATCH_STORES_PATH", "/etc/pricewatch/stores.yaml");
    map.insert("PRICEWATCH_HTTP_USER_AGENT", "custom-agent/2.0");
    map.insert("PRICEWATCH_INTER_QUERY_DELAY_MS", "0");
    map.insert("PRICEWATCH_LIMIT_PER_QUERY", "120");
    map.insert("PRICEWATCH_SCHEDULE_CRON", "0 30 * * * *");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.database_url, "sqlite::memory:");
    assert_eq!(cfg.env, Environment::Production);
    assert_eq!(
        cfg.stores_path,
        PathBuf::from("/etc/pricewatch/stores.yaml")
    );
    assert_eq!(cfg.http_user_agent, "custom-agent/2.0");
    assert_eq!(cfg.inter_query_delay_ms, 0);
    assert_eq!(cfg.limit_per_query, 120);
    assert_eq!(cfg.schedule_cron, "0 30 * * * *");
}

#[test]
fn blank_value_falls_back_to_default() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_LOG_LEVEL", "  ");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.log_level, "info");
}

#[test]
fn invalid_environment_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_ENV", "staging");
    assert_invalid(&map, "PRICEWATCH_ENV");
}

#[test]
fn http_timeout_secs_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_HTTP_TIMEOUT_SECS", "not-a-number");
    assert_invalid(&map, "PRICEWATCH_HTTP_TIMEOUT_SECS");
}

#[test]
fn db_max_connections_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_DB_MAX_CONNECTIONS", "-1");
    assert_invalid(&map, "PRICEWATCH_DB_MAX_CONNECTIONS");
}

#[test]
fn db_min_connections_above_max_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_DB_MAX_CONNECTIONS", "2");
    map.insert("PRICEWATCH_DB_MIN_CONNECTIONS", "4");
    assert_invalid(&map, "PRICEWATCH_DB_MIN_CONNECTIONS");
}

#[test]
fn limit_per_query_zero_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_LIMIT_PER_QUERY", "0");
    assert_invalid(&map, "PRICEWATCH_LIMIT_PER_QUERY");
}

#[test]
fn html_max_retries_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_HTML_MAX_RETRIES", "three");
    assert_invalid(&map, "PRICEWATCH_HTML_MAX_RETRIES");
}

#[test]
fn debug_output_redacts_database_url() {
    let mut map = HashMap::new();
    map.insert("DATABASE_URL", "sqlite://secret-location.db");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("secret-location"));
    assert!(rendered.contains("[redacted]"));
}
