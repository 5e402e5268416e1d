//! Data models for the weather ETL pipeline
//!
//! This module contains the core domain models organized by concern:
//! - Location: monitored places and the province registry
//! - Weather: current observations
//! - Air quality: pollutant observations
//! - Forecast: forecast steps
//! - Quality: data quality audit findings

pub mod air_quality;
pub mod forecast;
pub mod location;
pub mod quality;
pub mod weather;

// Re-export all public types for convenient access
pub use air_quality::{AirQualityRecord, Pollutants};
pub use forecast::ForecastRecord;
pub use location::{DEFAULT_LOCATIONS, Location, province_for};
pub use quality::{CheckKind, CheckStatus, QualityFinding};
pub use weather::WeatherRecord;
