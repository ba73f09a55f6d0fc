//! Fetch collaborator contracts.
//!
//! The scheduler only talks to upstream APIs through these traits. Every
//! implementation is expected to bound its own network time (connect and
//! response timeouts); a slow call stalls every other domain.

use async_trait::async_trait;

use crate::types::{QuoteSnapshot, ResolvedLocation, TransitSnapshot, WeatherSnapshot};
use crate::Error;

#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Geocode a configured city name.
    async fn resolve_location(&self, name: &str) -> Result<ResolvedLocation, Error>;

    /// Fetch current conditions and forecast for a resolved location.
    async fn fetch_weather(&self, location: &ResolvedLocation) -> Result<WeatherSnapshot, Error>;
}

#[async_trait]
pub trait TransitSource: Send + Sync {
    async fn fetch_stop(&self, stop_id: &str) -> Result<TransitSnapshot, Error>;
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch one batch of quotes. Symbols that fail individually are left
    /// out of the result; an empty result is reported as success here and
    /// judged by the caller.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<QuoteSnapshot>, Error>;
}
