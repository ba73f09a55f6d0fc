//! Unified error type for deskboard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Geocoding error: {0}")]
    Geocode(String),

    #[error("Weather API error: {0}")]
    Weather(String),

    #[error("Transit API error: {0}")]
    Transit(String),

    #[error("Quote API error: {0}")]
    Quotes(String),
}
