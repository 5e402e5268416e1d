//! ETL orchestration: concurrent per-location fan-out, aggregation under
//! partial failure, quality gate, persistence and alerting.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::{AlertDispatcher, is_extreme_temperature};
use crate::config::RunConfig;
use crate::error::FetchError;
use crate::health::HealthMonitor;
use crate::models::{AirQualityRecord, ForecastRecord, Location, WeatherRecord};
use crate::normalize::{normalize_air_quality, normalize_forecast, normalize_weather};
use crate::quality::QualityGate;
use crate::source::DataSource;
use crate::store::{Batch, Persister, WEATHER_TABLE};
use crate::{PipelineError, Result};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_FORECAST_ENTRIES: usize = 5;

/// Outcome of one location's work unit, consumed once by aggregation
#[derive(Debug)]
pub enum LocationResult {
    Success {
        location: Location,
        weather: WeatherRecord,
        air_quality: Option<AirQualityRecord>,
        forecasts: Vec<ForecastRecord>,
    },
    Failure {
        location: Location,
        error: FetchError,
    },
}

impl LocationResult {
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            LocationResult::Success { location, .. } | LocationResult::Failure { location, .. } => {
                location
            }
        }
    }
}

/// Results partitioned by domain after the join
#[derive(Debug, Default)]
pub struct Aggregate {
    pub weather: Vec<WeatherRecord>,
    pub air_quality: Vec<AirQualityRecord>,
    pub forecasts: Vec<ForecastRecord>,
    pub succeeded: Vec<Location>,
    pub failed: Vec<(Location, FetchError)>,
}

impl Aggregate {
    /// Partition results, preserving their order
    #[must_use]
    pub fn from_results(results: Vec<LocationResult>) -> Self {
        let mut aggregate = Self::default();
        for result in results {
            match result {
                LocationResult::Success {
                    location,
                    weather,
                    air_quality,
                    forecasts,
                } => {
                    aggregate.weather.push(weather);
                    aggregate.air_quality.extend(air_quality);
                    aggregate.forecasts.extend(forecasts);
                    aggregate.succeeded.push(location);
                }
                LocationResult::Failure { location, error } => {
                    aggregate.failed.push((location, error));
                }
            }
        }
        aggregate
    }
}

/// What one run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub succeeded: Vec<Location>,
    pub failed: Vec<Location>,
    /// Rows written per table
    pub rows_written: BTreeMap<String, u64>,
    /// Tables whose append failed
    pub persistence_failures: Vec<String>,
    /// Non-passing quality findings, one line each
    pub quality_issues: Vec<String>,
    pub elapsed_ms: u64,
}

/// Coordinates one run across the fixed location registry
pub struct EtlOrchestrator {
    locations: Vec<Location>,
    workers: usize,
    run_timeout: Duration,
    forecast_entries: usize,
    source: Arc<dyn DataSource>,
    store: Arc<dyn Persister>,
    alerts: Arc<dyn AlertDispatcher>,
    quality: QualityGate,
    health: Option<HealthMonitor>,
}

impl EtlOrchestrator {
    pub fn new(
        locations: Vec<Location>,
        source: Arc<dyn DataSource>,
        store: Arc<dyn Persister>,
        alerts: Arc<dyn AlertDispatcher>,
    ) -> Self {
        let quality = QualityGate::new(store.clone());
        Self {
            locations,
            workers: DEFAULT_WORKERS,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            forecast_entries: DEFAULT_FORECAST_ENTRIES,
            source,
            store,
            alerts,
            quality,
            health: None,
        }
    }

    /// Build from the `[pipeline]` config section
    pub fn from_config(
        config: &RunConfig,
        source: Arc<dyn DataSource>,
        store: Arc<dyn Persister>,
        alerts: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self::new(Location::registry(&config.locations), source, store, alerts)
            .with_workers(config.workers)
            .with_run_timeout(config.run_timeout())
            .with_forecast_entries(config.forecast_entries)
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    #[must_use]
    pub fn with_forecast_entries(mut self, forecast_entries: usize) -> Self {
        self.forecast_entries = forecast_entries;
        self
    }

    /// Log a health check before each run
    #[must_use]
    pub fn with_health_monitor(mut self, health: HealthMonitor) -> Self {
        self.health = Some(health);
        self
    }

    /// Execute one complete run.
    ///
    /// Only a schema initialization failure is returned as an error; every
    /// other failure is isolated, logged, alerted and reported in the summary.
    #[instrument(skip(self), fields(locations = self.locations.len(), workers = self.workers))]
    pub async fn run_once(&self) -> Result<RunSummary> {
        let started = Instant::now();

        if let Err(e) = self.store.ensure_schema().await {
            error!("Failed to initialize database schema, aborting run: {}", e);
            return Err(match e {
                PipelineError::Schema { .. } => e,
                other => PipelineError::schema(other.to_string()),
            });
        }

        if let Some(health) = &self.health {
            health.log_health_check().await;
        }

        info!("Starting ETL run for {} locations", self.locations.len());
        let results = self.fan_out().await;
        let aggregate = Aggregate::from_results(results);

        for (location, error) in &aggregate.failed {
            self.alerts
                .pipeline_failure_alert(&location.name, &error.to_string())
                .await;
        }

        for record in &aggregate.weather {
            if let Some(temperature) = record.temperature.filter(|t| is_extreme_temperature(*t)) {
                self.alerts
                    .weather_alert(
                        record.location.as_deref().unwrap_or("<unknown>"),
                        temperature,
                        record.condition.as_deref().unwrap_or("unknown"),
                    )
                    .await;
            }
        }

        let mut summary = RunSummary {
            failed: aggregate.failed.iter().map(|(l, _)| l.clone()).collect(),
            succeeded: aggregate.succeeded,
            ..RunSummary::default()
        };

        if !aggregate.weather.is_empty() {
            let findings = self.quality.evaluate(&aggregate.weather, WEATHER_TABLE).await;
            summary.quality_issues = findings
                .iter()
                .filter(|f| !f.passed())
                .map(|f| f.issue_line())
                .collect();
        }

        for batch in [
            Batch::Weather(aggregate.weather),
            Batch::AirQuality(aggregate.air_quality),
            Batch::Forecast(aggregate.forecasts),
        ] {
            self.persist(batch, &mut summary).await;
        }

        if !summary.quality_issues.is_empty() {
            self.alerts.quality_alert(&summary.quality_issues).await;
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "ETL run completed in {}ms. Success: {} locations, Failed: {} locations",
            summary.elapsed_ms,
            summary.succeeded.len(),
            summary.failed.len()
        );

        Ok(summary)
    }

    /// Run one unit per location, at most `workers` at a time, bounded by the
    /// run deadline. Results come back in registry order.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    async fn fan_out(&self) -> Vec<LocationResult> {
        let deadline = Instant::now().checked_add(self.run_timeout);
        if deadline.is_none() {
            warn!("Run timeout {:?} is unbounded, running without a deadline", self.run_timeout);
        }
        let timeout_secs = self.run_timeout.as_secs();

        let mut results: Vec<(usize, LocationResult)> =
            stream::iter(self.locations.iter().cloned().enumerate())
                .map(|(index, location)| async move {
                    let outcome = match deadline {
                        Some(deadline) => {
                            tokio::time::timeout_at(deadline, self.process_location(&location))
                                .await
                        }
                        None => Ok(self.process_location(&location).await),
                    };
                    let result = match outcome {
                        Ok(result) => result,
                        Err(_) => {
                            error!("Processing {} exceeded the run deadline", location.name);
                            LocationResult::Failure {
                                location,
                                error: FetchError::Timeout {
                                    seconds: timeout_secs,
                                },
                            }
                        }
                    };
                    (index, result)
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    #[instrument(skip(self), fields(location = %location.name))]
    async fn process_location(&self, location: &Location) -> LocationResult {
        info!("Processing data for {}", location.name);
        match self.extract_location(location).await {
            Ok((weather, air_quality, forecasts)) => {
                info!("Successfully processed data for {}", location.name);
                LocationResult::Success {
                    location: location.clone(),
                    weather,
                    air_quality,
                    forecasts,
                }
            }
            Err(error) => {
                error!("Failed to process data for {}: {}", location.name, error);
                LocationResult::Failure {
                    location: location.clone(),
                    error,
                }
            }
        }
    }

    async fn extract_location(
        &self,
        location: &Location,
    ) -> std::result::Result<(WeatherRecord, Option<AirQualityRecord>, Vec<ForecastRecord>), FetchError>
    {
        let raw_weather = self.source.fetch_current_weather(location).await?;
        let weather = normalize_weather(&raw_weather, location, Utc::now());

        let air_quality = match weather.coordinates() {
            Some((lat, lon)) => self
                .source
                .fetch_air_quality(lat, lon)
                .await?
                .and_then(|raw| normalize_air_quality(&raw, location, lat, lon, Utc::now())),
            None => {
                warn!("No coordinates for {}, skipping air quality", location.name);
                None
            }
        };
        match &air_quality {
            Some(record) => debug!("Air quality for {}: {}", location.name, record.aqi_label()),
            None => debug!("No air quality data for {}", location.name),
        }

        let raw_forecast = self.source.fetch_forecast(location).await?;
        let forecasts =
            normalize_forecast(&raw_forecast, location, self.forecast_entries, Utc::now());

        Ok((weather, air_quality, forecasts))
    }

    /// Append one non-empty batch; failures are logged and alerted, never propagated
    async fn persist(&self, batch: Batch, summary: &mut RunSummary) {
        let table = batch.table();
        if batch.is_empty() {
            debug!("Nothing to load into {}", table);
            return;
        }
        match self.store.append(&batch).await {
            Ok(rows) => {
                info!("Loaded {} rows into {}", rows, table);
                summary.rows_written.insert(table.to_string(), rows);
            }
            Err(e) => {
                error!("Failed to load {}: {}", table, e);
                summary.persistence_failures.push(table.to_string());
                self.alerts
                    .pipeline_failure_alert(table, &e.to_string())
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather(city: &str, temperature: f64) -> WeatherRecord {
        WeatherRecord {
            location: Some(city.into()),
            province: None,
            timestamp: Utc::now(),
            temperature: Some(temperature),
            humidity: Some(50),
            condition: Some("clear sky".into()),
            latitude: Some(52.0),
            longitude: Some(5.0),
            wind_speed: None,
            wind_direction: None,
            pressure: None,
            visibility_km: None,
            feels_like: None,
        }
    }

    #[test]
    fn test_aggregate_partitions_results() {
        let now = Utc::now();
        let results = vec![
            LocationResult::Success {
                location: Location::new("Amsterdam"),
                weather: weather("Amsterdam", 20.0),
                air_quality: None,
                forecasts: vec![
                    ForecastRecord {
                        location: "Amsterdam".into(),
                        forecast_date: now,
                        temperature: Some(21.0),
                        humidity: None,
                        condition: None,
                        created_at: now,
                    };
                    3
                ],
            },
            LocationResult::Failure {
                location: Location::new("Rotterdam"),
                error: FetchError::Timeout { seconds: 1 },
            },
            LocationResult::Success {
                location: Location::new("Utrecht"),
                weather: weather("Utrecht", 18.0),
                air_quality: Some(AirQualityRecord {
                    location: "Utrecht".into(),
                    latitude: 52.09,
                    longitude: 5.12,
                    aqi: Some(1),
                    pollutants: Default::default(),
                    timestamp: now,
                }),
                forecasts: vec![],
            },
        ];

        let aggregate = Aggregate::from_results(results);

        assert_eq!(aggregate.weather.len(), 2);
        assert_eq!(aggregate.air_quality.len(), 1);
        assert_eq!(aggregate.forecasts.len(), 3);
        assert_eq!(
            aggregate
                .succeeded
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>(),
            vec!["Amsterdam", "Utrecht"]
        );
        assert_eq!(aggregate.failed.len(), 1);
        assert_eq!(aggregate.failed[0].0.name, "Rotterdam");
    }

    #[test]
    fn test_location_result_accessor() {
        let result = LocationResult::Failure {
            location: Location::new("Zwolle"),
            error: FetchError::Timeout { seconds: 5 },
        };
        assert_eq!(result.location().name, "Zwolle");
    }
}
