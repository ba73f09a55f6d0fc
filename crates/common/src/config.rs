//! Board configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level board configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Cities to track. Index 0 is the primary city.
    #[serde(default = "default_cities")]
    pub cities: Vec<String>,

    /// Transit stop codes to track.
    #[serde(default)]
    pub stops: Vec<String>,

    /// Ticker symbols for the quotes screen. Empty disables the domain.
    #[serde(default)]
    pub symbols: Vec<String>,

    /// TMB developer application id.
    #[serde(default)]
    pub tmb_app_id: String,

    /// TMB developer application key.
    #[serde(default)]
    pub tmb_app_key: String,

    /// Connect and response timeout applied to every upstream request.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Scheduling parameters.
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Scheduler loop period.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Minimum spacing between any two network fetch attempts.
    #[serde(default = "default_min_request_spacing")]
    pub min_request_spacing_ms: u64,

    /// Max age of the selected city's weather before a selection change refetches.
    #[serde(default = "default_weather_active_stale")]
    pub weather_active_stale_secs: u64,

    /// Max age of any city's weather before the background sweep refetches.
    #[serde(default = "default_weather_background_stale")]
    pub weather_background_stale_secs: u64,

    /// Max age of the selected stop's arrivals before a selection change refetches.
    #[serde(default = "default_transit_active_stale")]
    pub transit_active_stale_secs: u64,

    /// Max age of any stop's arrivals before the background sweep refetches.
    #[serde(default = "default_transit_background_stale")]
    pub transit_background_stale_secs: u64,

    /// Minimum wait before retrying a city or stop whose last fetch failed.
    #[serde(default = "default_failed_retry")]
    pub failed_retry_secs: u64,

    /// Period of the quote batch refresh.
    #[serde(default = "default_quotes_refresh")]
    pub quotes_refresh_secs: u64,

    /// How long a consuming reader waits for the published-state lock.
    #[serde(default = "default_consume_lock_timeout")]
    pub consume_lock_timeout_ms: u64,
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn min_request_spacing(&self) -> Duration {
        Duration::from_millis(self.min_request_spacing_ms)
    }

    pub fn weather_active_stale(&self) -> Duration {
        Duration::from_secs(self.weather_active_stale_secs)
    }

    pub fn weather_background_stale(&self) -> Duration {
        Duration::from_secs(self.weather_background_stale_secs)
    }

    pub fn transit_active_stale(&self) -> Duration {
        Duration::from_secs(self.transit_active_stale_secs)
    }

    pub fn transit_background_stale(&self) -> Duration {
        Duration::from_secs(self.transit_background_stale_secs)
    }

    pub fn failed_retry(&self) -> Duration {
        Duration::from_secs(self.failed_retry_secs)
    }

    pub fn quotes_refresh(&self) -> Duration {
        Duration::from_secs(self.quotes_refresh_secs)
    }

    pub fn consume_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.consume_lock_timeout_ms)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_cities() -> Vec<String> {
    vec!["Barcelona".into()]
}

fn default_http_timeout() -> u64 {
    5
}

fn default_tick_interval() -> u64 {
    50
}
fn default_min_request_spacing() -> u64 {
    1000
}
fn default_weather_active_stale() -> u64 {
    600
}
fn default_weather_background_stale() -> u64 {
    900
}
fn default_transit_active_stale() -> u64 {
    60
}
fn default_transit_background_stale() -> u64 {
    300
}
fn default_failed_retry() -> u64 {
    60
}
fn default_quotes_refresh() -> u64 {
    300
}
fn default_consume_lock_timeout() -> u64 {
    20
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            min_request_spacing_ms: default_min_request_spacing(),
            weather_active_stale_secs: default_weather_active_stale(),
            weather_background_stale_secs: default_weather_background_stale(),
            transit_active_stale_secs: default_transit_active_stale(),
            transit_background_stale_secs: default_transit_background_stale(),
            failed_retry_secs: default_failed_retry(),
            quotes_refresh_secs: default_quotes_refresh(),
            consume_lock_timeout_ms: default_consume_lock_timeout(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            cities: default_cities(),
            stops: Vec::new(),
            symbols: Vec::new(),
            tmb_app_id: String::new(),
            tmb_app_key: String::new(),
            http_timeout_secs: default_http_timeout(),
            timing: TimingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_thresholds_shorter_than_background() {
        let timing = TimingConfig::default();
        assert!(timing.weather_active_stale() < timing.weather_background_stale());
        assert!(timing.transit_active_stale() < timing.transit_background_stale());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg: BoardConfig = serde_json::from_str(r#"{"symbols": ["AAPL"], "timing": {"tick_interval_ms": 10}}"#)
            .expect("partial config should deserialize");
        assert_eq!(cfg.cities, vec!["Barcelona".to_string()]);
        assert_eq!(cfg.symbols, vec!["AAPL".to_string()]);
        assert_eq!(cfg.timing.tick_interval(), Duration::from_millis(10));
        assert_eq!(cfg.timing.quotes_refresh_secs, 300);
        assert_eq!(cfg.timing.failed_retry(), Duration::from_secs(60));
        assert_eq!(cfg.http_timeout_secs, 5);
    }
}
