//! Shared types, config, collaborator traits, and error definitions for deskboard.

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::BoardConfig;
pub use error::Error;
pub use source::{QuoteSource, TransitSource, WeatherSource};
pub use types::*;
