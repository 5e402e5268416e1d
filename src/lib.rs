//! `nl-weather-etl` - Weather, air quality and forecast ETL for Dutch cities
//!
//! This library fetches per-location data concurrently from OpenWeatherMap,
//! normalizes it, checks batch quality, appends it to a relational store and
//! raises alerts for extreme weather, failures and quality issues.

pub mod alerts;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod quality;
pub mod scheduler;
pub mod source;
pub mod store;

// Re-export core types for public API
pub use alerts::{AlertDispatcher, EmailAlerts};
pub use config::PipelineConfig;
pub use error::{FetchError, PipelineError};
pub use health::HealthMonitor;
pub use models::{AirQualityRecord, ForecastRecord, Location, QualityFinding, WeatherRecord};
pub use orchestrator::{EtlOrchestrator, LocationResult, RunSummary};
pub use quality::QualityGate;
pub use source::{DataSource, OpenWeatherClient};
pub use store::{Batch, Persister, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
