//! Air quality observation record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pollutant concentrations in μg/m³
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Pollutants {
    pub co: Option<f64>,
    pub no: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub so2: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub nh3: Option<f64>,
}

/// Zero or one per location per run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AirQualityRecord {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Ordinal index, 1 (good) to 5 (very poor)
    pub aqi: Option<i64>,
    pub pollutants: Pollutants,
    pub timestamp: DateTime<Utc>,
}

impl AirQualityRecord {
    /// Label for the ordinal index
    #[must_use]
    pub fn aqi_label(&self) -> &'static str {
        match self.aqi {
            Some(1) => "Good",
            Some(2) => "Fair",
            Some(3) => "Moderate",
            Some(4) => "Poor",
            Some(5) => "Very Poor",
            _ => "Unknown",
        }
    }
}
