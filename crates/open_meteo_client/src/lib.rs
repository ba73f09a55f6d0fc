//! Open-Meteo client.
//!
//! Geocodes configured city names and fetches current conditions, a 24 hour
//! hourly window, a 7 day daily forecast and the European AQI, converting
//! them into the shared `WeatherSnapshot` format.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use common::{
    CurrentConditions, DailyForecast, Error, HourlyForecast, ResolvedLocation, WeatherSnapshot,
    WeatherSource,
};
use serde::Deserialize;
use tracing::{debug, warn};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
const HOURLY_WINDOW: usize = 24;
const DAILY_WINDOW: usize = 7;

/// Open-Meteo API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
}

// ── Open-Meteo response types ─────────────────────────────────────────

/// Response from the geocoding search endpoint.
#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    #[serde(default)]
    pub results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodingResult {
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Response from `/v1/forecast`.
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub current: CurrentBlock,
    #[serde(default)]
    pub hourly: Option<HourlyBlock>,
    #[serde(default)]
    pub daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentBlock {
    pub temperature_2m: f64,
    #[serde(default)]
    pub apparent_temperature: Option<f64>,
    #[serde(default)]
    pub relative_humidity_2m: Option<f64>,
    #[serde(default)]
    pub pressure_msl: Option<f64>,
    pub weather_code: u16,
    #[serde(default)]
    pub wind_speed_10m: Option<f64>,
    #[serde(default)]
    pub wind_direction_10m: Option<f64>,
    #[serde(default)]
    pub is_day: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyBlock {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub weather_code: Vec<Option<u16>>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct DailyBlock {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub weather_code: Vec<Option<u16>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct AirQualityResponse {
    pub current: AirQualityCurrent,
}

#[derive(Debug, Deserialize)]
pub struct AirQualityCurrent {
    #[serde(default)]
    pub european_aqi: Option<f64>,
}

// ── Implementation ────────────────────────────────────────────────────

impl OpenMeteoClient {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("deskboard/0.1")
            .pool_max_idle_per_host(2)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build Open-Meteo HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Look up coordinates for a city name.
    pub async fn geocode(&self, name: &str) -> Result<ResolvedLocation, Error> {
        debug!("Geocoding city: {}", name);

        let resp = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", name), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .map_err(|e| Error::Geocode(format!("HTTP error for {name}: {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::Geocode(format!("geocoder returned {status} for {name}")));
        }

        let payload: GeocodingResponse = resp
            .json()
            .await
            .map_err(|e| Error::Geocode(format!("JSON parse error for {name}: {e}")))?;

        resolve_from(name, payload)
    }

    /// Fetch the raw forecast payload.
    pub async fn fetch_forecast(&self, lat: f64, lon: f64) -> Result<ForecastResponse, Error> {
        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            (
                "current",
                "temperature_2m,relative_humidity_2m,apparent_temperature,pressure_msl,\
                 weather_code,wind_speed_10m,wind_direction_10m,is_day"
                    .to_string(),
            ),
            ("hourly", "temperature_2m,weather_code,precipitation_probability".to_string()),
            ("daily", "weather_code,temperature_2m_max,temperature_2m_min".to_string()),
            ("forecast_hours", HOURLY_WINDOW.to_string()),
            ("forecast_days", DAILY_WINDOW.to_string()),
            ("timezone", "auto".to_string()),
        ];

        debug!("Fetching Open-Meteo forecast: lat={} lon={}", lat, lon);

        let resp = self
            .client
            .get(FORECAST_URL)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Weather(format!("HTTP error for ({lat},{lon}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Weather(format!(
                "Open-Meteo returned {} for ({lat},{lon}): {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Weather(format!("JSON parse error for ({lat},{lon}): {e}")))
    }

    /// Fetch the current European AQI. Callers treat failure as "unknown".
    pub async fn fetch_air_quality(&self, lat: f64, lon: f64) -> Result<u32, Error> {
        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("current", "european_aqi".to_string()),
        ];

        let resp = self
            .client
            .get(AIR_QUALITY_URL)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Weather(format!("AQI HTTP error for ({lat},{lon}): {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(Error::Weather(format!("AQI endpoint returned {status}")));
        }

        let payload: AirQualityResponse = resp
            .json()
            .await
            .map_err(|e| Error::Weather(format!("AQI JSON parse error: {e}")))?;

        payload
            .current
            .european_aqi
            .map(|aqi| aqi.round().max(0.0) as u32)
            .ok_or_else(|| Error::Weather("AQI missing from response".into()))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn resolve_location(&self, name: &str) -> Result<ResolvedLocation, Error> {
        self.geocode(name).await
    }

    async fn fetch_weather(&self, location: &ResolvedLocation) -> Result<WeatherSnapshot, Error> {
        let forecast = self.fetch_forecast(location.lat, location.lon).await?;

        let air_quality = match self.fetch_air_quality(location.lat, location.lon).await {
            Ok(aqi) => Some(aqi),
            Err(e) => {
                warn!("Air quality unavailable for {}: {}", location.name, e);
                None
            }
        };

        build_snapshot(&location.name, forecast, air_quality)
    }
}

fn resolve_from(query: &str, payload: GeocodingResponse) -> Result<ResolvedLocation, Error> {
    let Some(first) = payload.results.into_iter().next() else {
        return Err(Error::Geocode(format!("no results for {query}")));
    };

    let name = if first.name.trim().is_empty() {
        query.to_string()
    } else {
        first.name
    };

    debug!(
        "Resolved {} to {:.4}, {:.4} ({})",
        query, first.latitude, first.longitude, name
    );

    Ok(ResolvedLocation {
        query: query.to_string(),
        name,
        lat: first.latitude,
        lon: first.longitude,
    })
}

/// Moon phase bucket for a calendar date: 0 new, 2 first quarter, 4 full,
/// 6 last quarter.
pub fn moon_phase(date: NaiveDate) -> u8 {
    let mut year = date.year() as f64;
    let mut month = date.month() as f64;
    if month < 3.0 {
        year -= 1.0;
        month += 12.0;
    }
    month += 1.0;

    let days = 365.25 * year + 30.6 * month + date.day() as f64 - 694_039.09;
    let cycles = days / 29.530_588_2;
    let fraction = cycles - cycles.floor();

    ((fraction * 8.0 + 0.5) as u8) & 7
}

fn build_snapshot(
    location_name: &str,
    forecast: ForecastResponse,
    air_quality: Option<u32>,
) -> Result<WeatherSnapshot, Error> {
    let current = &forecast.current;
    let conditions = CurrentConditions {
        temp_c: current.temperature_2m,
        feels_like_c: current.apparent_temperature.unwrap_or(current.temperature_2m),
        humidity: current
            .relative_humidity_2m
            .map(|h| h.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(0),
        pressure_hpa: current.pressure_msl.unwrap_or(0.0),
        weather_code: current.weather_code,
        wind_speed_kmh: current.wind_speed_10m.unwrap_or(0.0),
        wind_direction_deg: current
            .wind_direction_10m
            .map(|d| d.round().rem_euclid(360.0) as u16)
            .unwrap_or(0),
        is_night: current.is_day == Some(0),
    };

    let hourly = forecast
        .hourly
        .as_ref()
        .map(collect_hourly)
        .unwrap_or_default();

    let daily = forecast
        .daily
        .as_ref()
        .map(collect_daily)
        .unwrap_or_default();

    if daily.is_empty() {
        return Err(Error::Weather(format!(
            "No daily forecast rows for {location_name}"
        )));
    }

    Ok(WeatherSnapshot {
        location: location_name.to_string(),
        current: conditions,
        hourly,
        daily,
        air_quality,
        captured_at: Utc::now(),
    })
}

fn collect_hourly(block: &HourlyBlock) -> Vec<HourlyForecast> {
    block
        .time
        .iter()
        .enumerate()
        .take(HOURLY_WINDOW)
        .filter_map(|(i, time)| {
            let temp_c = block.temperature_2m.get(i).copied().flatten()?;
            let weather_code = block.weather_code.get(i).copied().flatten()?;
            let precip_prob = block
                .precipitation_probability
                .get(i)
                .copied()
                .flatten()
                .map(|p| (p / 100.0).clamp(0.0, 1.0))
                .unwrap_or(0.0);
            Some(HourlyForecast {
                time: time.clone(),
                temp_c,
                weather_code,
                precip_prob,
            })
        })
        .collect()
}

fn collect_daily(block: &DailyBlock) -> Vec<DailyForecast> {
    block
        .time
        .iter()
        .enumerate()
        .take(DAILY_WINDOW)
        .filter_map(|(i, raw_date)| {
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").ok()?;
            Some(DailyForecast {
                date,
                max_temp_c: block.temperature_2m_max.get(i).copied().flatten()?,
                min_temp_c: block.temperature_2m_min.get(i).copied().flatten()?,
                weather_code: block.weather_code.get(i).copied().flatten().unwrap_or(0),
                moon_phase: moon_phase(date),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_forecast() -> &'static str {
        r#"{
            "latitude": 41.39,
            "longitude": 2.16,
            "current": {
                "time": "2026-10-19T14:00",
                "temperature_2m": 21.4,
                "relative_humidity_2m": 63,
                "apparent_temperature": 20.9,
                "pressure_msl": 1016.2,
                "weather_code": 3,
                "wind_speed_10m": 11.2,
                "wind_direction_10m": 204,
                "is_day": 1
            },
            "hourly": {
                "time": ["2026-10-19T14:00", "2026-10-19T15:00", "2026-10-19T16:00"],
                "temperature_2m": [21.4, 21.0, null],
                "weather_code": [3, 61, 63],
                "precipitation_probability": [10, 55, 80]
            },
            "daily": {
                "time": ["2026-10-19", "2026-10-20"],
                "weather_code": [61, 1],
                "temperature_2m_max": [22.8, 24.1],
                "temperature_2m_min": [15.2, 16.0]
            }
        }"#
    }

    #[test]
    fn test_build_snapshot_maps_forecast() {
        let parsed: ForecastResponse =
            serde_json::from_str(sample_forecast()).expect("forecast should deserialize");

        let snapshot = build_snapshot("Barcelona", parsed, Some(23)).expect("snapshot should build");

        assert_eq!(snapshot.location, "Barcelona");
        assert_eq!(snapshot.current.weather_code, 3);
        assert_eq!(snapshot.current.humidity, 63);
        assert_eq!(snapshot.current.wind_direction_deg, 204);
        assert!(!snapshot.current.is_night);
        // Third hour has no temperature and is dropped.
        assert_eq!(snapshot.hourly.len(), 2);
        assert!((snapshot.hourly[1].precip_prob - 0.55).abs() < 1e-9);
        assert_eq!(snapshot.daily.len(), 2);
        assert_eq!(snapshot.daily[0].weather_code, 61);
        assert_eq!(snapshot.air_quality, Some(23));
    }

    #[test]
    fn test_build_snapshot_without_daily_rows_fails() {
        let parsed: ForecastResponse = serde_json::from_str(
            r#"{"current": {"temperature_2m": 10.0, "weather_code": 0, "is_day": 0}}"#,
        )
        .expect("forecast should deserialize");

        assert!(build_snapshot("Nowhere", parsed, None).is_err());
    }

    #[test]
    fn test_resolve_prefers_geocoder_name() {
        let payload: GeocodingResponse = serde_json::from_str(
            r#"{"results": [{"name": "Barcelona", "latitude": 41.38879, "longitude": 2.15899}]}"#,
        )
        .expect("geocoding should deserialize");

        let resolved = resolve_from("barcelona", payload).expect("should resolve");
        assert_eq!(resolved.name, "Barcelona");
        assert_eq!(resolved.query, "barcelona");
        assert!((resolved.lat - 41.38879).abs() < 1e-6);
    }

    #[test]
    fn test_resolve_without_results_is_error() {
        let payload: GeocodingResponse =
            serde_json::from_str(r#"{"generationtime_ms": 0.5}"#).expect("should deserialize");
        assert!(matches!(resolve_from("Atlantis", payload), Err(Error::Geocode(_))));
    }

    #[test]
    fn test_moon_phase_known_dates() {
        // 2024-01-11 new moon, 2024-01-25 full moon.
        let new_moon = NaiveDate::from_ymd_opt(2024, 1, 11).expect("valid date");
        let full_moon = NaiveDate::from_ymd_opt(2024, 1, 25).expect("valid date");
        assert!(matches!(moon_phase(new_moon), 0 | 7 | 1));
        assert!(matches!(moon_phase(full_moon), 3..=5));
    }
}
