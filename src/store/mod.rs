//! Persistence backend abstraction
//!
//! Append is the only write mode. Duplicate detection belongs to the quality
//! gate, never to the store.

use async_trait::async_trait;

use crate::Result;
use crate::models::{AirQualityRecord, ForecastRecord, QualityFinding, WeatherRecord};

pub mod sqlite;

pub use sqlite::SqliteStore;

pub const WEATHER_TABLE: &str = "weather_data";
pub const AIR_QUALITY_TABLE: &str = "air_quality_data";
pub const FORECAST_TABLE: &str = "weather_forecast";
pub const QUALITY_TABLE: &str = "data_quality";

/// Same-domain records gathered across one run
#[derive(Debug, Clone)]
pub enum Batch {
    Weather(Vec<WeatherRecord>),
    AirQuality(Vec<AirQualityRecord>),
    Forecast(Vec<ForecastRecord>),
    QualityFindings(Vec<QualityFinding>),
}

impl Batch {
    /// Target table for this batch
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Batch::Weather(_) => WEATHER_TABLE,
            Batch::AirQuality(_) => AIR_QUALITY_TABLE,
            Batch::Forecast(_) => FORECAST_TABLE,
            Batch::QualityFindings(_) => QUALITY_TABLE,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Batch::Weather(records) => records.len(),
            Batch::AirQuality(records) => records.len(),
            Batch::Forecast(records) => records.len(),
            Batch::QualityFindings(findings) => findings.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait Persister: Send + Sync {
    /// Create all tables if missing; safe to call on every run
    async fn ensure_schema(&self) -> Result<()>;

    /// Append a batch in one transaction, returning the number of rows written
    async fn append(&self, batch: &Batch) -> Result<u64>;
}
