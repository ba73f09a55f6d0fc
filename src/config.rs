//! Configuration loader: merges .env, config.toml and environment variables.

use common::{BoardConfig, Error};
use std::path::Path;

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn validate_config(config: &BoardConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.cities.is_empty() {
        issues.push("cities must contain at least one city".into());
    }
    if config.cities.iter().any(|c| c.trim().is_empty()) {
        issues.push("cities must not contain blank names".into());
    }
    if config.stops.iter().any(|s| s.trim().is_empty()) {
        issues.push("stops must not contain blank codes".into());
    }
    if config.symbols.iter().any(|s| s.trim().is_empty()) {
        issues.push("symbols must not contain blank tickers".into());
    }
    if !config.stops.is_empty() && (config.tmb_app_id.trim().is_empty() || config.tmb_app_key.trim().is_empty()) {
        issues.push("TMB_APP_ID and TMB_APP_KEY are required when stops are configured".into());
    }
    if config.http_timeout_secs == 0 {
        issues.push("http_timeout_secs must be > 0".into());
    }

    let timing = &config.timing;
    if timing.tick_interval_ms == 0 {
        issues.push("timing.tick_interval_ms must be > 0".into());
    }
    if timing.weather_active_stale_secs == 0 {
        issues.push("timing.weather_active_stale_secs must be > 0".into());
    }
    if timing.weather_background_stale_secs == 0 {
        issues.push("timing.weather_background_stale_secs must be > 0".into());
    }
    if timing.transit_active_stale_secs == 0 {
        issues.push("timing.transit_active_stale_secs must be > 0".into());
    }
    if timing.transit_background_stale_secs == 0 {
        issues.push("timing.transit_background_stale_secs must be > 0".into());
    }
    if timing.quotes_refresh_secs == 0 {
        issues.push("timing.quotes_refresh_secs must be > 0".into());
    }
    if timing.weather_active_stale_secs > timing.weather_background_stale_secs {
        issues.push("timing.weather_active_stale_secs must be <= timing.weather_background_stale_secs".into());
    }
    if timing.transit_active_stale_secs > timing.transit_background_stale_secs {
        issues.push("timing.transit_active_stale_secs must be <= timing.transit_background_stale_secs".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!("Invalid config:\n - {}", issues.join("\n - "))))
    }
}

/// Apply environment overrides, reading variables through `var`.
fn apply_overrides(config: &mut BoardConfig, var: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
    if let Some(raw) = var("DESKBOARD_CITIES") {
        config.cities = parse_list(&raw);
    }
    if let Some(raw) = var("DESKBOARD_STOPS") {
        config.stops = parse_list(&raw);
    }
    if let Some(raw) = var("DESKBOARD_SYMBOLS") {
        config.symbols = parse_list(&raw);
    }
    if let Some(id) = var("TMB_APP_ID") {
        config.tmb_app_id = id;
    }
    if let Some(key) = var("TMB_APP_KEY") {
        config.tmb_app_key = key;
    }
    if let Some(raw) = var("DESKBOARD_MIN_REQUEST_SPACING_MS") {
        config.timing.min_request_spacing_ms = parse_u64(&raw, "DESKBOARD_MIN_REQUEST_SPACING_MS")?;
    }
    Ok(())
}

/// Load board configuration from environment and optional config file.
pub fn load_config() -> Result<BoardConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = BoardConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    apply_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&BoardConfig::default()).is_ok());
    }

    #[test]
    fn test_toml_file_shape() {
        let config: BoardConfig = toml::from_str(
            r#"
            cities = ["Barcelona", "Girona"]
            symbols = ["AAPL", "^IBEX"]

            [timing]
            min_request_spacing_ms = 1500
            "#,
        )
        .expect("config.toml should parse");

        assert_eq!(config.cities.len(), 2);
        assert_eq!(config.timing.min_request_spacing_ms, 1500);
        assert_eq!(config.timing.weather_active_stale_secs, 600);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_env_overrides_lists_and_spacing() {
        let mut config = BoardConfig::default();
        let vars = env(&[
            ("DESKBOARD_CITIES", "Barcelona, Sabadell ,,Lleida"),
            ("DESKBOARD_STOPS", "108,1265"),
            ("TMB_APP_ID", "id"),
            ("TMB_APP_KEY", "key"),
            ("DESKBOARD_MIN_REQUEST_SPACING_MS", "2500"),
        ]);

        apply_overrides(&mut config, vars).expect("overrides should apply");

        assert_eq!(config.cities, vec!["Barcelona", "Sabadell", "Lleida"]);
        assert_eq!(config.stops, vec!["108", "1265"]);
        assert_eq!(config.timing.min_request_spacing_ms, 2500);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_spacing_override_is_rejected() {
        let mut config = BoardConfig::default();
        let err = apply_overrides(&mut config, env(&[("DESKBOARD_MIN_REQUEST_SPACING_MS", "soon")]))
            .expect_err("non-numeric spacing must fail");
        assert!(err.to_string().contains("DESKBOARD_MIN_REQUEST_SPACING_MS"));
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut config = BoardConfig {
            cities: Vec::new(),
            stops: vec!["108".into()],
            ..BoardConfig::default()
        };
        config.timing.tick_interval_ms = 0;

        let msg = validate_config(&config).expect_err("config is invalid").to_string();
        assert!(msg.contains("cities must contain at least one city"));
        assert!(msg.contains("TMB_APP_ID and TMB_APP_KEY"));
        assert!(msg.contains("timing.tick_interval_ms"));
    }
}
