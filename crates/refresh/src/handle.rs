//! Consumer-facing API for the display layer.

use std::sync::Arc;
use std::time::Duration;

use common::{Domain, QuoteSnapshot, TransitSnapshot, WeatherSnapshot};

use crate::published::{Published, PublishedSlot};
use crate::signals::{FetchStatus, ManualTriggers};

/// State shared between the scheduler and every consumer.
#[derive(Debug)]
pub(crate) struct BoardShared {
    pub(crate) weather: PublishedSlot<WeatherSnapshot>,
    pub(crate) transit: PublishedSlot<TransitSnapshot>,
    pub(crate) quotes: PublishedSlot<Vec<QuoteSnapshot>>,
    pub(crate) triggers: ManualTriggers,
    pub(crate) status: FetchStatus,
}

impl BoardShared {
    pub(crate) fn new(consume_wait: Duration) -> Self {
        Self {
            weather: PublishedSlot::new(consume_wait),
            transit: PublishedSlot::new(consume_wait),
            quotes: PublishedSlot::new(consume_wait),
            triggers: ManualTriggers::new(),
            status: FetchStatus::new(),
        }
    }
}

/// One domain's published value.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainUpdate {
    Weather(Published<WeatherSnapshot>),
    Transit(Published<TransitSnapshot>),
    Quotes(Published<Vec<QuoteSnapshot>>),
}

impl DomainUpdate {
    pub fn domain(&self) -> Domain {
        match self {
            DomainUpdate::Weather(_) => Domain::Weather,
            DomainUpdate::Transit(_) => Domain::Transit,
            DomainUpdate::Quotes(_) => Domain::Quotes,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DomainUpdate::Weather(p) => p.is_empty(),
            DomainUpdate::Transit(p) => p.is_empty(),
            DomainUpdate::Quotes(p) => p.is_empty(),
        }
    }
}

/// Cheap-to-clone handle the display layer uses to read published data,
/// request refreshes and observe fetch status.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    shared: Arc<BoardShared>,
}

impl BoardHandle {
    pub(crate) fn new(shared: Arc<BoardShared>) -> Self {
        Self { shared }
    }

    /// Latest value for `domain` if it changed since the last consume.
    /// Reports `None` when the lock is not acquired within the configured wait.
    pub async fn consume_if_updated(&self, domain: Domain) -> Option<DomainUpdate> {
        match domain {
            Domain::Weather => self.shared.weather.consume_if_updated().await.map(DomainUpdate::Weather),
            Domain::Transit => self.shared.transit.consume_if_updated().await.map(DomainUpdate::Transit),
            Domain::Quotes => self.shared.quotes.consume_if_updated().await.map(DomainUpdate::Quotes),
        }
    }

    /// Zero-wait variant of [`consume_if_updated`](Self::consume_if_updated).
    pub fn try_consume_if_updated(&self, domain: Domain) -> Option<DomainUpdate> {
        match domain {
            Domain::Weather => self.shared.weather.try_consume_if_updated().map(DomainUpdate::Weather),
            Domain::Transit => self.shared.transit.try_consume_if_updated().map(DomainUpdate::Transit),
            Domain::Quotes => self.shared.quotes.try_consume_if_updated().map(DomainUpdate::Quotes),
        }
    }

    /// Current value for `domain`; leaves the dirty flag alone.
    pub async fn peek_current(&self, domain: Domain) -> DomainUpdate {
        match domain {
            Domain::Weather => DomainUpdate::Weather(self.shared.weather.peek_current().await),
            Domain::Transit => DomainUpdate::Transit(self.shared.transit.peek_current().await),
            Domain::Quotes => DomainUpdate::Quotes(self.shared.quotes.peek_current().await),
        }
    }

    /// Blocking [`peek_current`](Self::peek_current) for code running
    /// outside the async runtime. Panics inside an async context.
    pub fn blocking_peek_current(&self, domain: Domain) -> DomainUpdate {
        match domain {
            Domain::Weather => DomainUpdate::Weather(self.shared.weather.blocking_peek_current()),
            Domain::Transit => DomainUpdate::Transit(self.shared.transit.blocking_peek_current()),
            Domain::Quotes => DomainUpdate::Quotes(self.shared.quotes.blocking_peek_current()),
        }
    }

    pub fn trigger_weather_refresh(&self) {
        self.shared.triggers.trigger(Domain::Weather);
    }

    pub fn trigger_transit_refresh(&self) {
        self.shared.triggers.trigger(Domain::Transit);
    }

    pub fn trigger_quotes_refresh(&self) {
        self.shared.triggers.trigger(Domain::Quotes);
    }

    pub fn is_refresh_pending(&self, domain: Domain) -> bool {
        self.shared.triggers.is_pending(domain)
    }

    pub fn is_fetch_in_flight(&self, domain: Domain) -> bool {
        self.shared.status.is_in_flight(domain)
    }

    /// Index of the city or stop being fetched. Always `Some(0)` for quotes
    /// while a batch is in flight.
    pub fn in_flight_entity(&self, domain: Domain) -> Option<usize> {
        self.shared.status.in_flight_entity(domain)
    }

    /// True once after each start or end of a fetch in `domain`.
    pub fn take_status_changed(&self, domain: Domain) -> bool {
        self.shared.status.take_changed(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn handle() -> BoardHandle {
        BoardHandle::new(Arc::new(BoardShared::new(Duration::from_millis(20))))
    }

    fn quote(symbol: &str, price: f64) -> QuoteSnapshot {
        QuoteSnapshot {
            symbol: symbol.into(),
            price,
            change_percent: 0.5,
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_consume_routes_by_domain() {
        let handle = handle();
        handle.shared.quotes.publish(vec![quote("AAPL", 190.0)]).await;

        assert_eq!(handle.consume_if_updated(Domain::Weather).await, None);
        assert_eq!(handle.consume_if_updated(Domain::Transit).await, None);

        let update = handle.consume_if_updated(Domain::Quotes).await.expect("quotes update");
        assert_eq!(update.domain(), Domain::Quotes);
        match update {
            DomainUpdate::Quotes(Published::Data(quotes)) => assert_eq!(quotes[0].symbol, "AAPL"),
            other => panic!("unexpected update: {:?}", other),
        }
        assert_eq!(handle.consume_if_updated(Domain::Quotes).await, None);
    }

    #[tokio::test]
    async fn test_peek_reports_empty_before_first_fetch() {
        let handle = handle();
        assert!(handle.peek_current(Domain::Transit).await.is_empty());
        assert!(handle.try_consume_if_updated(Domain::Transit).is_none());
    }

    #[test]
    fn test_blocking_peek_outside_runtime() {
        let handle = handle();
        assert!(handle.blocking_peek_current(Domain::Weather).is_empty());
        assert_eq!(handle.blocking_peek_current(Domain::Quotes).domain(), Domain::Quotes);
    }

    #[test]
    fn test_triggers_and_status_visible_through_clones() {
        let handle = handle();
        let display = handle.clone();

        display.trigger_transit_refresh();
        assert!(handle.is_refresh_pending(Domain::Transit));
        assert!(!handle.is_refresh_pending(Domain::Weather));

        handle.shared.status.begin(Domain::Weather, 1);
        assert!(display.is_fetch_in_flight(Domain::Weather));
        assert_eq!(display.in_flight_entity(Domain::Weather), Some(1));
        assert!(display.take_status_changed(Domain::Weather));
        assert!(!display.take_status_changed(Domain::Weather));
    }
}
