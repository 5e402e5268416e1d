//! Operational health checks: database reachability, data freshness, host
//! resources and recent pipeline metrics.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, System};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::store::SqliteStore;

/// Data no older than this many hours is fresh
pub const FRESH_WITHIN_HOURS: i64 = 2;
/// Data no older than this many hours is stale; anything older is very stale
pub const STALE_WITHIN_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseHealth {
    pub healthy: bool,
    pub response_time_ms: u64,
    pub weather_records: Option<i64>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    Fresh,
    Stale,
    VeryStale,
    NoData,
    Error,
}

impl fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FreshnessStatus::Fresh => "fresh",
            FreshnessStatus::Stale => "stale",
            FreshnessStatus::VeryStale => "very_stale",
            FreshnessStatus::NoData => "no_data",
            FreshnessStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataFreshness {
    pub status: FreshnessStatus,
    pub latest: Option<DateTime<Utc>>,
    pub age_hours: Option<f64>,
}

/// Host utilization in percent
#[derive(Debug, Clone, Serialize)]
pub struct SystemResources {
    pub cpu_percent: f32,
    pub memory_percent: f64,
    /// Used space across all mounted disks
    pub disk_percent: f64,
    pub checked_at: DateTime<Utc>,
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

/// Blocks for [`MINIMUM_CPU_UPDATE_INTERVAL`] to get a CPU reading
fn sample_system_resources() -> SystemResources {
    let mut system = System::new();
    system.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    system.refresh_memory();

    let disks = Disks::new_with_refreshed_list();
    let (total, available) = disks.list().iter().fold((0u64, 0u64), |(t, a), disk| {
        (t + disk.total_space(), a + disk.available_space())
    });

    SystemResources {
        cpu_percent: system.global_cpu_usage(),
        memory_percent: percent(system.used_memory(), system.total_memory()),
        disk_percent: percent(total.saturating_sub(available), total),
        checked_at: Utc::now(),
    }
}

/// Classify the age of the newest observation
#[must_use]
pub fn classify_freshness(latest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DataFreshness {
    let Some(latest) = latest else {
        return DataFreshness {
            status: FreshnessStatus::NoData,
            latest: None,
            age_hours: None,
        };
    };

    let age = now - latest;
    let status = if age <= Duration::hours(FRESH_WITHIN_HOURS) {
        FreshnessStatus::Fresh
    } else if age <= Duration::hours(STALE_WITHIN_HOURS) {
        FreshnessStatus::Stale
    } else {
        FreshnessStatus::VeryStale
    };

    DataFreshness {
        status,
        latest: Some(latest),
        age_hours: Some(age.num_seconds() as f64 / 3600.0),
    }
}

#[derive(Clone)]
pub struct HealthMonitor {
    store: SqliteStore,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub async fn check_database(&self) -> DatabaseHealth {
        let started = Instant::now();
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(self.store.pool())
            .await
        {
            Ok(_) => DatabaseHealth {
                healthy: true,
                response_time_ms: started.elapsed().as_millis() as u64,
                weather_records: self.store.count(crate::store::WEATHER_TABLE).await.ok(),
                error: None,
                checked_at: Utc::now(),
            },
            Err(e) => DatabaseHealth {
                healthy: false,
                response_time_ms: started.elapsed().as_millis() as u64,
                weather_records: None,
                error: Some(e.to_string()),
                checked_at: Utc::now(),
            },
        }
    }

    pub async fn check_data_freshness(&self, now: DateTime<Utc>) -> DataFreshness {
        match self.store.latest_weather_timestamp().await {
            Ok(latest) => classify_freshness(latest, now),
            Err(e) => {
                warn!("Freshness check failed: {}", e);
                DataFreshness {
                    status: FreshnessStatus::Error,
                    latest: None,
                    age_hours: None,
                }
            }
        }
    }

    /// Quality findings per status recorded since `since`
    pub async fn quality_summary(&self, since: DateTime<Utc>) -> BTreeMap<String, i64> {
        match self.store.quality_counts_since(since).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Quality summary failed: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Sample CPU, memory and disk usage off the async runtime
    pub async fn check_system_resources(&self) -> SystemResources {
        match tokio::task::spawn_blocking(sample_system_resources).await {
            Ok(resources) => resources,
            Err(e) => {
                warn!("System resource sampling failed: {}", e);
                SystemResources {
                    cpu_percent: 0.0,
                    memory_percent: 0.0,
                    disk_percent: 0.0,
                    checked_at: Utc::now(),
                }
            }
        }
    }

    /// Weather rows per UTC day since `since`
    pub async fn daily_weather_counts(&self, since: DateTime<Utc>) -> BTreeMap<String, i64> {
        match self.store.weather_counts_by_day(since).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Daily record counts failed: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Run every check and log the outcome
    pub async fn log_health_check(&self) {
        let now = Utc::now();

        let resources = self.check_system_resources().await;
        info!(
            "System: CPU {:.1}%, Memory {:.1}%, Disk {:.1}%",
            resources.cpu_percent, resources.memory_percent, resources.disk_percent
        );

        let database = self.check_database().await;
        if database.healthy {
            info!(
                response_time_ms = database.response_time_ms,
                "Database healthy ({} weather records)",
                database.weather_records.unwrap_or_default()
            );
        } else {
            error!(
                "Database unhealthy: {}",
                database.error.as_deref().unwrap_or("unknown error")
            );
            return;
        }

        let freshness = self.check_data_freshness(now).await;
        match freshness.status {
            FreshnessStatus::Fresh | FreshnessStatus::NoData => {
                info!("Data freshness: {}", freshness.status)
            }
            _ => warn!(
                "Data freshness: {} ({:.1}h old)",
                freshness.status,
                freshness.age_hours.unwrap_or_default()
            ),
        }

        let daily = self.daily_weather_counts(now - Duration::days(7)).await;
        info!("Weather records per day over the last 7 days: {:?}", daily);

        let summary = self.quality_summary(now - Duration::hours(24)).await;
        info!("Quality findings in the last 24h: {:?}", summary);
    }
}
