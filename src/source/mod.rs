//! Upstream data provider abstraction
//!
//! The orchestrator only talks to [`DataSource`]; the OpenWeatherMap client is
//! the production implementation and tests substitute scripted ones.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::Location;

pub mod openweather;
pub mod payload;

pub use openweather::OpenWeatherClient;
pub use payload::{RawAirQuality, RawForecast, RawWeather};

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Current conditions for a location
    async fn fetch_current_weather(&self, location: &Location) -> Result<RawWeather, FetchError>;

    /// Air pollution at a coordinate pair; `Ok(None)` when the provider has no data
    async fn fetch_air_quality(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<RawAirQuality>, FetchError>;

    /// 5-day / 3-hour forecast for a location
    async fn fetch_forecast(&self, location: &Location) -> Result<RawForecast, FetchError>;
}
