//! Current weather observation record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized observation per location per run.
///
/// `location`, `temperature` and `humidity` are optional because upstream
/// payloads are untrusted; the quality gate reports missing values before the
/// batch is persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherRecord {
    /// City name as reported by the provider
    pub location: Option<String>,
    /// Province from the static registry
    pub province: Option<String>,
    /// Assigned at normalization time
    pub timestamp: DateTime<Utc>,
    /// Temperature in Celsius
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<i64>,
    /// Human-readable description of weather conditions
    pub condition: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Wind speed in m/s
    pub wind_speed: Option<f64>,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    pub wind_direction: Option<i64>,
    /// Atmospheric pressure in hPa
    pub pressure: Option<f64>,
    /// Visibility in kilometers
    pub visibility_km: Option<f64>,
    /// Apparent temperature in Celsius
    pub feels_like: Option<f64>,
}

impl WeatherRecord {
    /// Coordinates, when the provider returned both
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}
