//! Conversion of raw provider payloads into canonical records
//!
//! All functions are pure and total over well-formed payloads: optional values
//! missing upstream (wind, pressure, visibility, ...) stay unset instead of
//! failing the location.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{
    AirQualityRecord, ForecastRecord, Location, Pollutants, WeatherRecord, province_for,
};
use crate::source::payload::{RawAirQuality, RawCondition, RawForecast, RawWeather};

fn first_description(conditions: &[RawCondition]) -> Option<String> {
    conditions.first().and_then(|c| c.description.clone())
}

fn non_empty(name: Option<&String>) -> Option<String> {
    name.map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn to_whole(value: Option<f64>) -> Option<i64> {
    value.filter(|v| v.is_finite()).map(|v| v.round() as i64)
}

/// Normalize a current-weather payload for `location`, stamped with `now`
#[must_use]
pub fn normalize_weather(raw: &RawWeather, location: &Location, now: DateTime<Utc>) -> WeatherRecord {
    let name = non_empty(raw.name.as_ref()).unwrap_or_else(|| location.name.clone());
    let province = province_for(&name)
        .map(str::to_string)
        .or_else(|| location.province.clone());

    let main = raw.main.clone().unwrap_or_default();
    let coord = raw.coord.clone().unwrap_or_default();
    let wind = raw.wind.clone().unwrap_or_default();

    WeatherRecord {
        location: Some(name),
        province,
        timestamp: now,
        temperature: main.temp,
        humidity: to_whole(main.humidity),
        condition: first_description(&raw.weather),
        latitude: coord.lat,
        longitude: coord.lon,
        wind_speed: wind.speed,
        wind_direction: to_whole(wind.deg),
        pressure: main.pressure,
        visibility_km: raw.visibility.map(|m| m / 1000.0),
        feels_like: main.feels_like,
    }
}

/// Normalize an air-pollution payload; `None` when it holds no measurement.
///
/// `lat`/`lon` are the coordinates the request was made for and are used when
/// the payload does not echo them back.
#[must_use]
pub fn normalize_air_quality(
    raw: &RawAirQuality,
    location: &Location,
    lat: f64,
    lon: f64,
    now: DateTime<Utc>,
) -> Option<AirQualityRecord> {
    let entry = raw.list.first()?;
    let coord = raw.coord.clone().unwrap_or_default();
    let components = entry.components.clone().unwrap_or_default();

    Some(AirQualityRecord {
        location: location.name.clone(),
        latitude: coord.lat.unwrap_or(lat),
        longitude: coord.lon.unwrap_or(lon),
        aqi: entry.main.as_ref().and_then(|m| m.aqi),
        pollutants: Pollutants {
            co: components.co,
            no: components.no,
            no2: components.no2,
            o3: components.o3,
            so2: components.so2,
            pm2_5: components.pm2_5,
            pm10: components.pm10,
            nh3: components.nh3,
        },
        timestamp: now,
    })
}

fn parse_forecast_time(dt: Option<i64>, dt_txt: Option<&str>) -> Option<DateTime<Utc>> {
    dt.and_then(|secs| DateTime::from_timestamp(secs, 0)).or_else(|| {
        dt_txt.and_then(|txt| {
            NaiveDateTime::parse_from_str(txt, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
    })
}

/// Normalize the first `limit` steps of a forecast payload.
///
/// Steps without any usable time are skipped.
#[must_use]
pub fn normalize_forecast(
    raw: &RawForecast,
    location: &Location,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<ForecastRecord> {
    let name = non_empty(raw.city.as_ref().and_then(|c| c.name.as_ref()))
        .unwrap_or_else(|| location.name.clone());

    raw.list
        .iter()
        .take(limit)
        .filter_map(|entry| {
            let forecast_date = parse_forecast_time(entry.dt, entry.dt_txt.as_deref())?;
            let main = entry.main.clone().unwrap_or_default();
            Some(ForecastRecord {
                location: name.clone(),
                forecast_date,
                temperature: main.temp,
                humidity: to_whole(main.humidity),
                condition: first_description(&entry.weather),
                created_at: now,
            })
        })
        .collect()
}
