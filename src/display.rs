//! Headless stand-in for the screen: polls the board handle and logs what a
//! display would render. Also hosts the log-backed ambient indicator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use common::{Domain, QuoteSnapshot, TransitSnapshot, WeatherSnapshot};
use refresh::{AmbientCondition, AmbientIndicator, BoardHandle, DomainUpdate, Published, Selection, SelectionState};

const MAX_ARRIVALS_SHOWN: usize = 3;

pub struct DisplayOptions {
    pub poll_interval: Duration,
    /// Advance the selected city and stop this often, as a user paging
    /// through screens would.
    pub rotate_every: Option<Duration>,
    pub cities: usize,
    pub stops: usize,
}

pub async fn run_display(handle: BoardHandle, selection: Arc<SelectionState>, opts: DisplayOptions) {
    let mut poll = tokio::time::interval(opts.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_rotate = Instant::now();

    loop {
        poll.tick().await;

        for domain in Domain::ALL {
            if handle.take_status_changed(domain) {
                match handle.in_flight_entity(domain) {
                    Some(entity) => debug!("[{}] updating entity {}", domain, entity),
                    None => debug!("[{}] idle", domain),
                }
            }
            if let Some(update) = handle.consume_if_updated(domain).await {
                info!("[{}] {}", domain, summarize(&update));
            }
        }

        if let Some(every) = opts.rotate_every {
            if last_rotate.elapsed() >= every {
                last_rotate = Instant::now();
                rotate(&selection, opts.cities, opts.stops);
            }
        }
    }
}

fn rotate(selection: &SelectionState, cities: usize, stops: usize) {
    if cities > 1 {
        let next = (selection.active_city() + 1) % cities;
        info!("Showing city {}", next);
        selection.select_city(next);
    }
    if stops > 1 {
        let next = (selection.active_stop() + 1) % stops;
        info!("Showing stop {}", next);
        selection.select_stop(next);
    }
}

/// One-line rendering of a published value.
pub fn summarize(update: &DomainUpdate) -> String {
    match update {
        DomainUpdate::Weather(Published::Data(w)) => summarize_weather(w),
        DomainUpdate::Transit(Published::Data(t)) => summarize_transit(t),
        DomainUpdate::Quotes(Published::Data(q)) => summarize_quotes(q),
        _ => "no data yet".to_string(),
    }
}

fn summarize_weather(w: &WeatherSnapshot) -> String {
    let aqi = w.air_quality.map_or_else(|| "-".to_string(), |a| a.to_string());
    let mut line = format!(
        "{}: {:.1}°C (feels {:.1}°C), code {}, wind {:.0} km/h, AQI {}",
        w.location, w.current.temp_c, w.current.feels_like_c, w.current.weather_code, w.current.wind_speed_kmh, aqi
    );
    if let Some(today) = w.daily.first() {
        line.push_str(&format!(", today {:.0}/{:.0}°C", today.min_temp_c, today.max_temp_c));
    }
    line
}

fn summarize_transit(t: &TransitSnapshot) -> String {
    if t.arrivals.is_empty() {
        return format!("Stop {} {}: no buses", t.stop_code, t.stop_name);
    }
    let arrivals = t
        .arrivals
        .iter()
        .take(MAX_ARRIVALS_SHOWN)
        .map(|a| format!("{} → {} {}", a.line, a.destination, a.eta_text))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Stop {} {}: {}", t.stop_code, t.stop_name, arrivals)
}

fn summarize_quotes(quotes: &[QuoteSnapshot]) -> String {
    quotes
        .iter()
        .map(|q| format!("{} {:.2} ({:+.2}%)", q.symbol, q.price, q.change_percent))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Published value as JSON, for dry-run output.
pub fn to_json(update: &DomainUpdate) -> serde_json::Result<String> {
    match update {
        DomainUpdate::Weather(p) => serde_json::to_string(&p.data()),
        DomainUpdate::Transit(p) => serde_json::to_string(&p.data()),
        DomainUpdate::Quotes(p) => serde_json::to_string(&p.data()),
    }
}

/// Ambient indicator that logs the LED colour whenever it changes.
#[derive(Debug, Default)]
pub struct LogIndicator {
    last: Mutex<Option<AmbientCondition>>,
}

impl LogIndicator {
    /// Remember `condition`; true if it differs from the previous one.
    fn record(&self, condition: AmbientCondition) -> bool {
        match self.last.lock() {
            Ok(mut last) => last.replace(condition) != Some(condition),
            Err(_) => true,
        }
    }
}

impl AmbientIndicator for LogIndicator {
    fn show(&self, condition: AmbientCondition, snapshot: &WeatherSnapshot) {
        if self.record(condition) {
            let (r, g, b) = condition.rgb();
            info!(
                "Ambient LED for {}: {:?} -> rgb({}, {}, {})",
                snapshot.location, condition, r, g, b
            );
        }
    }
}
