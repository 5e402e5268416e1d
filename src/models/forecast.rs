//! Forecast record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One forecast step; up to five per location per run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForecastRecord {
    pub location: String,
    /// Time the forecast step applies to
    pub forecast_date: DateTime<Utc>,
    /// Temperature in Celsius
    pub temperature: Option<f64>,
    pub humidity: Option<i64>,
    pub condition: Option<String>,
    /// Assigned at normalization time
    pub created_at: DateTime<Utc>,
}
