//! The refresh scheduler.
//!
//! Each tick visits weather, transit and quotes in turn. Per domain:
//!
//! 1. A manual trigger or a selection change targets the selected entity.
//!    Manual always fetches; a selection change fetches only if the entity is
//!    stale by the domain's active threshold, otherwise the cached snapshot is
//!    republished.
//! 2. Otherwise the selected entity, once it has data, is kept within the
//!    active threshold. Transit does this only while its screen is visible.
//! 3. Otherwise the background sweep refreshes the first entity past the
//!    cursor that is stale by the background threshold.
//!
//! Steps 2 and 3 skip an entity whose last attempt failed less than
//! `failed_retry` ago.
//!
//! Every network call goes through one [`RequestGate`]. A request blocked by
//! the gate keeps its flags and is retried on the next tick. The domain after
//! the one that last won the gate goes first on the next tick, so one domain
//! cannot hold the gate for itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use common::config::TimingConfig;
use common::{
    BoardConfig, Domain, Error, QuoteSource, ResolvedLocation, TransitSnapshot, TransitSource,
    WeatherSnapshot, WeatherSource,
};

use crate::cache::{first_stale, EntityCache};
use crate::gate::RequestGate;
use crate::handle::{BoardHandle, BoardShared};
use crate::indicator::{AmbientCondition, AmbientIndicator};
use crate::selection::Selection;

/// Upstream collaborators, one per domain.
#[derive(Clone)]
pub struct SchedulerSources {
    pub weather: Arc<dyn WeatherSource>,
    pub transit: Arc<dyn TransitSource>,
    pub quotes: Arc<dyn QuoteSource>,
}

/// When a successful entity fetch is written to the domain's published slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPolicy {
    /// Publish the selected entity and the primary entity (index 0).
    SelectedOrPrimary,
    /// Publish the selected entity only.
    SelectedOnly,
}

impl PublishPolicy {
    pub fn should_publish(self, fetched: usize, selected: usize) -> bool {
        match self {
            PublishPolicy::SelectedOrPrimary => fetched == selected || fetched == 0,
            PublishPolicy::SelectedOnly => fetched == selected,
        }
    }
}

const WEATHER_POLICY: PublishPolicy = PublishPolicy::SelectedOrPrimary;
const TRANSIT_POLICY: PublishPolicy = PublishPolicy::SelectedOnly;

/// One network fetch made during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttempt {
    pub domain: Domain,
    /// City or stop index; always 0 for the quote batch.
    pub entity: usize,
    pub ok: bool,
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub attempted: Vec<FetchAttempt>,
    /// Selection changes served from cache.
    pub cache_hits: Vec<(Domain, usize)>,
    /// Domains whose manual or selection request waited on the request gate.
    pub gated: Vec<Domain>,
}

impl TickReport {
    pub fn fetch_count(&self) -> usize {
        self.attempted.len()
    }

    pub fn fetches_for(&self, domain: Domain) -> impl Iterator<Item = &FetchAttempt> + '_ {
        self.attempted.iter().filter(move |a| a.domain == domain)
    }
}

struct WeatherEntity {
    cache: EntityCache<WeatherSnapshot>,
    location: Option<ResolvedLocation>,
}

enum Demand {
    /// Nothing asked for the selected entity.
    None,
    /// Fetch the selected entity now.
    Fetch(usize),
    /// Selected entity is fresh; republish it.
    CacheHit(usize),
}

pub struct Scheduler {
    timing: TimingConfig,
    symbols: Vec<String>,
    cities: Vec<WeatherEntity>,
    stops: Vec<EntityCache<TransitSnapshot>>,
    weather_cursor: usize,
    transit_cursor: usize,
    /// Selection changes taken from [`Selection`] and not yet served.
    city_request: bool,
    stop_request: bool,
    /// Index into [`Domain::ALL`] of the domain visited first.
    lead: usize,
    last_quotes_attempt: Option<Instant>,
    gate: RequestGate,
    sources: SchedulerSources,
    selection: Arc<dyn Selection>,
    indicator: Arc<dyn AmbientIndicator>,
    shared: Arc<BoardShared>,
}

impl Scheduler {
    pub fn new(
        config: &BoardConfig,
        sources: SchedulerSources,
        selection: Arc<dyn Selection>,
        indicator: Arc<dyn AmbientIndicator>,
    ) -> (Self, BoardHandle) {
        let shared = Arc::new(BoardShared::new(config.timing.consume_lock_timeout()));
        let scheduler = Self {
            timing: config.timing.clone(),
            symbols: config.symbols.clone(),
            cities: config
                .cities
                .iter()
                .map(|name| WeatherEntity {
                    cache: EntityCache::new(name.clone()),
                    location: None,
                })
                .collect(),
            stops: config.stops.iter().map(|code| EntityCache::new(code.clone())).collect(),
            weather_cursor: 0,
            transit_cursor: 0,
            city_request: false,
            stop_request: false,
            lead: 0,
            last_quotes_attempt: None,
            gate: RequestGate::new(config.timing.min_request_spacing()),
            sources,
            selection,
            indicator,
            shared: shared.clone(),
        };
        (scheduler, BoardHandle::new(shared))
    }

    /// Another handle onto the published state.
    pub fn handle(&self) -> BoardHandle {
        BoardHandle::new(self.shared.clone())
    }

    pub fn city_cache(&self, index: usize) -> Option<&EntityCache<WeatherSnapshot>> {
        self.cities.get(index).map(|c| &c.cache)
    }

    pub fn stop_cache(&self, index: usize) -> Option<&EntityCache<TransitSnapshot>> {
        self.stops.get(index)
    }

    /// Tick forever at the configured interval. Runs for process lifetime.
    pub async fn run(mut self) {
        let period = self.timing.tick_interval().max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Scheduler running: {} cities, {} stops, {} symbols, tick {:?}, spacing {:?}",
            self.cities.len(),
            self.stops.len(),
            self.symbols.len(),
            period,
            self.gate.min_spacing()
        );

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// Run one scheduling pass over all domains.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let domains = Domain::ALL.len();
        for offset in 0..domains {
            match Domain::ALL[(self.lead + offset) % domains] {
                Domain::Weather => self.tick_weather(&mut report).await,
                Domain::Transit => self.tick_transit(&mut report).await,
                Domain::Quotes => self.tick_quotes(&mut report).await,
            }
        }
        if let Some(first) = report.attempted.first() {
            self.lead = (first.domain.index() + 1) % domains;
        }
        report
    }

    // ── Weather ───────────────────────────────────────────────────────

    async fn tick_weather(&mut self, report: &mut TickReport) {
        if self.selection.take_city_changed() {
            self.city_request = true;
        }
        let triggers = &self.shared.triggers;
        if self.cities.is_empty() {
            triggers.clear(Domain::Weather);
            self.city_request = false;
            return;
        }

        let now = Instant::now();
        let manual = triggers.is_pending(Domain::Weather);
        let selected = self.selection.active_city();

        let demand = if !manual && !self.city_request {
            Demand::None
        } else if selected >= self.cities.len() {
            debug!("Weather request for unknown city index {}; dropped", selected);
            triggers.clear(Domain::Weather);
            self.city_request = false;
            Demand::None
        } else if manual || self.cities[selected].cache.needs_refresh(now, self.timing.weather_active_stale()) {
            Demand::Fetch(selected)
        } else {
            Demand::CacheHit(selected)
        };

        match demand {
            Demand::Fetch(idx) => {
                if !self.gate.try_acquire() {
                    debug!("Weather request for {} waiting on request gate", self.cities[idx].cache.key());
                    report.gated.push(Domain::Weather);
                    return;
                }
                self.shared.triggers.clear(Domain::Weather);
                self.city_request = false;
                self.refresh_city(idx, report).await;
                return;
            }
            Demand::CacheHit(idx) => {
                self.city_request = false;
                if let Some(snapshot) = self.cities[idx].cache.snapshot() {
                    self.shared.weather.publish(snapshot.clone()).await;
                }
                debug!("Weather for {} is fresh; republished from cache", self.cities[idx].cache.key());
                report.cache_hits.push((Domain::Weather, idx));
            }
            Demand::None => {}
        }

        let retry = self.timing.failed_retry();
        if let Some(entity) = self.cities.get(selected) {
            if entity.cache.has_data() && entity.cache.is_due(now, self.timing.weather_active_stale(), retry) {
                if self.gate.try_acquire() {
                    debug!("Active weather refresh for {}", entity.cache.key());
                    self.refresh_city(selected, report).await;
                }
                return;
            }
        }

        let threshold = self.timing.weather_background_stale();
        let cities = &self.cities;
        let Some(idx) = first_stale(cities.len(), self.weather_cursor, |i| {
            cities[i].cache.is_due(now, threshold, retry)
        }) else {
            return;
        };
        if !self.gate.try_acquire() {
            return;
        }
        self.weather_cursor = (idx + 1) % self.cities.len();
        debug!("Background weather refresh for {}", self.cities[idx].cache.key());
        self.refresh_city(idx, report).await;
    }

    async fn refresh_city(&mut self, idx: usize, report: &mut TickReport) {
        self.cities[idx].cache.mark_attempt(Instant::now());
        self.shared.status.begin(Domain::Weather, idx);
        let result = self.fetch_city(idx).await;
        self.shared.status.finish(Domain::Weather);

        let selected = self.selection.active_city();
        let ok = result.is_ok();
        match result {
            Ok(snapshot) => {
                info!(
                    "Weather updated for {}: {:.1}°C, code {}",
                    snapshot.location, snapshot.current.temp_c, snapshot.current.weather_code
                );
                if idx == 0 {
                    let condition = AmbientCondition::classify(&snapshot);
                    self.indicator.show(condition, &snapshot);
                }
                if WEATHER_POLICY.should_publish(idx, selected) {
                    self.shared.weather.publish(snapshot.clone()).await;
                }
                self.cities[idx].cache.commit(snapshot, Instant::now());
            }
            Err(e) => {
                warn!("Failed to refresh weather for {}: {}", self.cities[idx].cache.key(), e);
                if idx == selected {
                    self.shared.weather.touch().await;
                }
            }
        }
        report.attempted.push(FetchAttempt {
            domain: Domain::Weather,
            entity: idx,
            ok,
        });
    }

    async fn fetch_city(&mut self, idx: usize) -> Result<WeatherSnapshot, Error> {
        let entity = &mut self.cities[idx];
        let location = match &entity.location {
            Some(location) => location.clone(),
            None => {
                let location = self.sources.weather.resolve_location(entity.cache.key()).await?;
                debug!(
                    "Resolved {} to {} ({:.3}, {:.3})",
                    location.query, location.name, location.lat, location.lon
                );
                entity.location = Some(location.clone());
                location
            }
        };
        self.sources.weather.fetch_weather(&location).await
    }

    // ── Transit ───────────────────────────────────────────────────────

    async fn tick_transit(&mut self, report: &mut TickReport) {
        if self.selection.take_stop_changed() {
            self.stop_request = true;
        }
        let triggers = &self.shared.triggers;
        if self.stops.is_empty() {
            triggers.clear(Domain::Transit);
            self.stop_request = false;
            return;
        }

        let now = Instant::now();
        let manual = triggers.is_pending(Domain::Transit);
        let selected = self.selection.active_stop();

        let demand = if !manual && !self.stop_request {
            Demand::None
        } else if selected >= self.stops.len() {
            debug!("Transit request for unknown stop index {}; dropped", selected);
            triggers.clear(Domain::Transit);
            self.stop_request = false;
            Demand::None
        } else if manual || self.stops[selected].needs_refresh(now, self.timing.transit_active_stale()) {
            Demand::Fetch(selected)
        } else {
            Demand::CacheHit(selected)
        };

        match demand {
            Demand::Fetch(idx) => {
                if !self.gate.try_acquire() {
                    debug!("Transit request for stop {} waiting on request gate", self.stops[idx].key());
                    report.gated.push(Domain::Transit);
                    return;
                }
                self.shared.triggers.clear(Domain::Transit);
                self.stop_request = false;
                self.refresh_stop(idx, report).await;
                return;
            }
            Demand::CacheHit(idx) => {
                self.stop_request = false;
                if let Some(snapshot) = self.stops[idx].snapshot() {
                    self.shared.transit.publish(snapshot.clone()).await;
                }
                debug!("Arrivals for stop {} are fresh; republished from cache", self.stops[idx].key());
                report.cache_hits.push((Domain::Transit, idx));
            }
            Demand::None => {}
        }

        if !self.selection.transit_visible() {
            return;
        }

        let retry = self.timing.failed_retry();
        if let Some(stop) = self.stops.get(selected) {
            if stop.has_data() && stop.is_due(now, self.timing.transit_active_stale(), retry) {
                if self.gate.try_acquire() {
                    debug!("Active transit refresh for stop {}", stop.key());
                    self.refresh_stop(selected, report).await;
                }
                return;
            }
        }

        let threshold = self.timing.transit_background_stale();
        let stops = &self.stops;
        let Some(idx) = first_stale(stops.len(), self.transit_cursor, |i| stops[i].is_due(now, threshold, retry)) else {
            return;
        };
        if !self.gate.try_acquire() {
            return;
        }
        self.transit_cursor = (idx + 1) % self.stops.len();
        debug!("Background transit refresh for stop {}", self.stops[idx].key());
        self.refresh_stop(idx, report).await;
    }

    async fn refresh_stop(&mut self, idx: usize, report: &mut TickReport) {
        self.stops[idx].mark_attempt(Instant::now());
        self.shared.status.begin(Domain::Transit, idx);
        let result = self.sources.transit.fetch_stop(self.stops[idx].key()).await;
        self.shared.status.finish(Domain::Transit);

        let selected = self.selection.active_stop();
        let ok = result.is_ok();
        match result {
            Ok(snapshot) => {
                info!(
                    "Arrivals updated for stop {} ({}): {} buses",
                    snapshot.stop_code,
                    snapshot.stop_name,
                    snapshot.arrivals.len()
                );
                if TRANSIT_POLICY.should_publish(idx, selected) {
                    self.shared.transit.publish(snapshot.clone()).await;
                }
                self.stops[idx].commit(snapshot, Instant::now());
            }
            Err(e) => {
                warn!("Failed to refresh arrivals for stop {}: {}", self.stops[idx].key(), e);
                if idx == selected {
                    self.shared.transit.touch().await;
                }
            }
        }
        report.attempted.push(FetchAttempt {
            domain: Domain::Transit,
            entity: idx,
            ok,
        });
    }

    // ── Quotes ────────────────────────────────────────────────────────

    async fn tick_quotes(&mut self, report: &mut TickReport) {
        if self.symbols.is_empty() {
            self.shared.triggers.clear(Domain::Quotes);
            return;
        }

        let now = Instant::now();
        let manual = self.shared.triggers.is_pending(Domain::Quotes);
        let due = match self.last_quotes_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.timing.quotes_refresh(),
        };
        if !manual && !due {
            return;
        }
        if !self.gate.try_acquire() {
            if manual {
                report.gated.push(Domain::Quotes);
            }
            return;
        }

        self.shared.triggers.clear(Domain::Quotes);
        self.last_quotes_attempt = Some(now);
        self.shared.status.begin(Domain::Quotes, 0);
        let result = self.sources.quotes.fetch_quotes(&self.symbols).await;
        self.shared.status.finish(Domain::Quotes);

        let ok = match result {
            Ok(quotes) if !quotes.is_empty() => {
                info!("Quotes updated: {}/{} symbols", quotes.len(), self.symbols.len());
                self.shared.quotes.publish(quotes).await;
                true
            }
            Ok(_) => {
                warn!("Quote refresh returned no symbols");
                self.shared.quotes.touch().await;
                false
            }
            Err(e) => {
                warn!("Failed to refresh quotes: {}", e);
                self.shared.quotes.touch().await;
                false
            }
        };
        report.attempted.push(FetchAttempt {
            domain: Domain::Quotes,
            entity: 0,
            ok,
        });
    }
}
