//! Raw OpenWeatherMap payloads.
//!
//! Every field is optional: the normalizer decides what a missing value means,
//! deserialization never rejects a well-formed body for lacking one.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCoord {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMain {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCondition {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWind {
    pub speed: Option<f64>,
    pub deg: Option<f64>,
}

/// `GET /weather`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWeather {
    pub name: Option<String>,
    pub main: Option<RawMain>,
    #[serde(default)]
    pub weather: Vec<RawCondition>,
    pub coord: Option<RawCoord>,
    pub wind: Option<RawWind>,
    /// Meters
    pub visibility: Option<f64>,
    pub dt: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAqi {
    pub aqi: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComponents {
    pub co: Option<f64>,
    pub no: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub so2: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub nh3: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAirEntry {
    pub main: Option<RawAqi>,
    pub components: Option<RawComponents>,
    pub dt: Option<i64>,
}

/// `GET /air_pollution`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAirQuality {
    pub coord: Option<RawCoord>,
    #[serde(default)]
    pub list: Vec<RawAirEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCity {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForecastEntry {
    pub dt: Option<i64>,
    pub dt_txt: Option<String>,
    pub main: Option<RawMain>,
    #[serde(default)]
    pub weather: Vec<RawCondition>,
}

/// `GET /forecast`, 5 days in 3-hour steps
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForecast {
    pub city: Option<RawCity>,
    #[serde(default)]
    pub list: Vec<RawForecastEntry>,
}
