//! Ambient rain indicator driven by the primary city's weather.

use common::WeatherSnapshot;

/// WMO codes from drizzle (51) upwards all mean something is falling.
const RAIN_CODE_MIN: u16 = 51;
const SOON_HOURS: std::ops::RangeInclusive<usize> = 1..=2;
const LATER_HOURS: std::ops::Range<usize> = 3..15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientCondition {
    RainingNow,
    /// Rain expected within the next two hours.
    RainSoon { hours: u8 },
    RainLater,
    Clear,
}

impl AmbientCondition {
    pub fn classify(snapshot: &WeatherSnapshot) -> Self {
        if is_rain(snapshot.current.weather_code) {
            return AmbientCondition::RainingNow;
        }

        let code_at = |hour: usize| snapshot.hourly.get(hour).map(|h| h.weather_code);

        if let Some(hour) = SOON_HOURS.into_iter().find(|&h| code_at(h).is_some_and(is_rain)) {
            return AmbientCondition::RainSoon { hours: hour as u8 };
        }
        if LATER_HOURS.into_iter().any(|h| code_at(h).is_some_and(is_rain)) {
            return AmbientCondition::RainLater;
        }
        AmbientCondition::Clear
    }

    /// Colour for an RGB status LED.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            AmbientCondition::RainingNow => (255, 0, 0),
            AmbientCondition::RainSoon { .. } => (255, 165, 0),
            AmbientCondition::RainLater => (255, 255, 0),
            AmbientCondition::Clear => (0, 255, 0),
        }
    }
}

fn is_rain(code: u16) -> bool {
    code >= RAIN_CODE_MIN
}

/// Receives the primary city's condition after every successful refresh,
/// whatever city is on screen.
pub trait AmbientIndicator: Send + Sync {
    fn show(&self, condition: AmbientCondition, snapshot: &WeatherSnapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{CurrentConditions, HourlyForecast};

    fn snapshot(current: u16, hourly: &[u16]) -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Barcelona".into(),
            current: CurrentConditions {
                temp_c: 18.0,
                feels_like_c: 18.0,
                humidity: 60,
                pressure_hpa: 1015.0,
                weather_code: current,
                wind_speed_kmh: 5.0,
                wind_direction_deg: 90,
                is_night: false,
            },
            hourly: hourly
                .iter()
                .enumerate()
                .map(|(i, code)| HourlyForecast {
                    time: format!("2026-10-19T{:02}:00", i),
                    temp_c: 18.0,
                    weather_code: *code,
                    precip_prob: 0.0,
                })
                .collect(),
            daily: Vec::new(),
            air_quality: None,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_raining_now_wins() {
        let s = snapshot(61, &[0, 0, 0]);
        assert_eq!(AmbientCondition::classify(&s), AmbientCondition::RainingNow);
        assert_eq!(AmbientCondition::RainingNow.rgb(), (255, 0, 0));
    }

    #[test]
    fn test_rain_within_two_hours() {
        let s = snapshot(3, &[3, 3, 80, 0]);
        assert_eq!(AmbientCondition::classify(&s), AmbientCondition::RainSoon { hours: 2 });
    }

    #[test]
    fn test_rain_later_in_window() {
        let mut hourly = vec![1u16; 24];
        hourly[10] = 63;
        let s = snapshot(1, &hourly);
        assert_eq!(AmbientCondition::classify(&s), AmbientCondition::RainLater);
    }

    #[test]
    fn test_rain_beyond_window_is_clear() {
        let mut hourly = vec![2u16; 24];
        hourly[20] = 95;
        let s = snapshot(0, &hourly);
        assert_eq!(AmbientCondition::classify(&s), AmbientCondition::Clear);
        assert_eq!(AmbientCondition::Clear.rgb(), (0, 255, 0));
    }

    #[test]
    fn test_short_hourly_series_is_handled() {
        let s = snapshot(0, &[]);
        assert_eq!(AmbientCondition::classify(&s), AmbientCondition::Clear);
    }
}
