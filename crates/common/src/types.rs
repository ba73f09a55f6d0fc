//! Domain types shared across the board.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Domains ───────────────────────────────────────────────────────────

/// An independently scheduled data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Weather,
    Transit,
    Quotes,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Weather, Domain::Transit, Domain::Quotes];

    /// Stable slot index, used for per-domain flag arrays.
    pub fn index(self) -> usize {
        match self {
            Domain::Weather => 0,
            Domain::Transit => 1,
            Domain::Quotes => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Domain::Weather => "weather",
            Domain::Transit => "transit",
            Domain::Quotes => "quotes",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Weather ───────────────────────────────────────────────────────────

/// Result of geocoding a configured city name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// Name as configured by the user.
    pub query: String,
    /// Display name returned by the geocoder (falls back to `query`).
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// Conditions at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub feels_like_c: f64,
    /// Relative humidity in percent.
    pub humidity: u8,
    /// Mean sea-level pressure in hPa.
    pub pressure_hpa: f64,
    /// WMO weather interpretation code.
    pub weather_code: u16,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: u16,
    pub is_night: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// Local time label as returned upstream, e.g. `2026-10-19T14:00`.
    pub time: String,
    pub temp_c: f64,
    pub weather_code: u16,
    /// Precipitation probability (0.0 - 1.0).
    pub precip_prob: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub weather_code: u16,
    /// 0 = new moon, 4 = full moon, 7 = waning crescent.
    pub moon_phase: u8,
}

/// One weather refresh for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: String,
    pub current: CurrentConditions,
    /// Next 24 hours, starting at the current hour.
    pub hourly: Vec<HourlyForecast>,
    /// Today plus up to six days.
    pub daily: Vec<DailyForecast>,
    /// European AQI, when the air-quality endpoint answered.
    pub air_quality: Option<u32>,
    pub captured_at: DateTime<Utc>,
}

// ── Transit ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub line: String,
    pub destination: String,
    pub eta_secs: u32,
    /// Short label for the screen ("Prop" when under a minute, else "N min").
    pub eta_text: String,
}

/// Upcoming arrivals at one stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitSnapshot {
    pub stop_code: String,
    pub stop_name: String,
    /// Sorted by `eta_secs`, soonest first. Empty means "no buses".
    pub arrivals: Vec<Arrival>,
    pub captured_at: DateTime<Utc>,
}

// ── Quotes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub price: f64,
    /// Change against previous close, in percent.
    pub change_percent: f64,
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_indices_are_distinct() {
        let mut seen = [false; 3];
        for domain in Domain::ALL {
            assert!(!seen[domain.index()]);
            seen[domain.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_domain_serializes_snake_case() {
        let json = serde_json::to_string(&Domain::Transit).expect("serialize");
        assert_eq!(json, "\"transit\"");
        assert_eq!(Domain::Quotes.to_string(), "quotes");
    }
}
