//! SQLite implementation of [`Persister`] on a sqlx connection pool

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, instrument};

use super::{
    AIR_QUALITY_TABLE, Batch, FORECAST_TABLE, Persister, QUALITY_TABLE, WEATHER_TABLE,
};
use crate::models::{AirQualityRecord, ForecastRecord, QualityFinding, WeatherRecord};
use crate::{PipelineError, Result};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS weather_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT,
        province TEXT,
        timestamp TEXT NOT NULL,
        temperature REAL,
        humidity INTEGER,
        weather TEXT,
        coordinates_lat REAL,
        coordinates_lon REAL,
        wind_speed REAL,
        wind_direction INTEGER,
        pressure REAL,
        visibility_km REAL,
        feels_like REAL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_weather_data_timestamp ON weather_data (timestamp)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS air_quality_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT NOT NULL,
        coordinates_lat REAL NOT NULL,
        coordinates_lon REAL NOT NULL,
        aqi INTEGER,
        co REAL,
        no REAL,
        no2 REAL,
        o3 REAL,
        so2 REAL,
        pm2_5 REAL,
        pm10 REAL,
        nh3 REAL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather_forecast (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT NOT NULL,
        forecast_date TEXT NOT NULL,
        temperature REAL,
        humidity INTEGER,
        weather TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS data_quality (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        table_name TEXT NOT NULL,
        check_type TEXT NOT NULL,
        status TEXT NOT NULL,
        details TEXT,
        timestamp TEXT NOT NULL
    )
    "#,
];

/// Fixed-width UTC text so that string order is chronological order
fn sql_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Relational store for observations, forecasts and quality findings
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connect to `url`, creating the database file if needed.
    ///
    /// In-memory databases are pinned to a single long-lived connection,
    /// otherwise every pooled connection would see its own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PipelineError::config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| PipelineError::persistence("database", format!("connect failed: {e}")))?;

        info!("Connected to database");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Number of rows in one of the managed tables
    pub async fn count(&self, table: &str) -> Result<i64> {
        if ![WEATHER_TABLE, AIR_QUALITY_TABLE, FORECAST_TABLE, QUALITY_TABLE].contains(&table) {
            return Err(PipelineError::persistence(table, "unknown table"));
        }
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::persistence(table, e.to_string()))?;
        Ok(count)
    }

    /// Timestamp of the newest weather observation, if any
    pub async fn latest_weather_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<String> = sqlx::query_scalar("SELECT MAX(timestamp) FROM weather_data")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::persistence(WEATHER_TABLE, e.to_string()))?;

        latest
            .map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        PipelineError::persistence(
                            WEATHER_TABLE,
                            format!("unreadable timestamp '{text}': {e}"),
                        )
                    })
            })
            .transpose()
    }

    /// Findings per status recorded since `since`
    pub async fn quality_counts_since(&self, since: DateTime<Utc>) -> Result<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM data_quality WHERE timestamp >= ? GROUP BY status",
        )
        .bind(sql_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::persistence(QUALITY_TABLE, e.to_string()))?;

        Ok(rows.into_iter().collect())
    }

    /// Weather rows per UTC day (`YYYY-MM-DD`) observed since `since`
    pub async fn weather_counts_by_day(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BTreeMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) FROM weather_data WHERE timestamp >= ? GROUP BY day",
        )
        .bind(sql_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::persistence(WEATHER_TABLE, e.to_string()))?;

        Ok(rows.into_iter().collect())
    }

    /// All persisted findings, oldest first
    pub async fn findings(&self) -> Result<Vec<(String, String, String, String)>> {
        sqlx::query_as(
            "SELECT table_name, check_type, status, details FROM data_quality ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::persistence(QUALITY_TABLE, e.to_string()))
    }
}

async fn insert_weather(tx: &mut Transaction<'_, Sqlite>, r: &WeatherRecord) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO weather_data (
            city, province, timestamp, temperature, humidity, weather,
            coordinates_lat, coordinates_lon, wind_speed, wind_direction,
            pressure, visibility_km, feels_like
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&r.location)
    .bind(&r.province)
    .bind(sql_timestamp(r.timestamp))
    .bind(r.temperature)
    .bind(r.humidity)
    .bind(&r.condition)
    .bind(r.latitude)
    .bind(r.longitude)
    .bind(r.wind_speed)
    .bind(r.wind_direction)
    .bind(r.pressure)
    .bind(r.visibility_km)
    .bind(r.feels_like)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_air_quality(
    tx: &mut Transaction<'_, Sqlite>,
    r: &AirQualityRecord,
) -> sqlx::Result<()> {
    let p = &r.pollutants;
    sqlx::query(
        r#"
        INSERT INTO air_quality_data (
            city, coordinates_lat, coordinates_lon, aqi,
            co, no, no2, o3, so2, pm2_5, pm10, nh3, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&r.location)
    .bind(r.latitude)
    .bind(r.longitude)
    .bind(r.aqi)
    .bind(p.co)
    .bind(p.no)
    .bind(p.no2)
    .bind(p.o3)
    .bind(p.so2)
    .bind(p.pm2_5)
    .bind(p.pm10)
    .bind(p.nh3)
    .bind(sql_timestamp(r.timestamp))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_forecast(tx: &mut Transaction<'_, Sqlite>, r: &ForecastRecord) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO weather_forecast (
            city, forecast_date, temperature, humidity, weather, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&r.location)
    .bind(sql_timestamp(r.forecast_date))
    .bind(r.temperature)
    .bind(r.humidity)
    .bind(&r.condition)
    .bind(sql_timestamp(r.created_at))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_finding(tx: &mut Transaction<'_, Sqlite>, f: &QualityFinding) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO data_quality (table_name, check_type, status, details, timestamp) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&f.target_table)
    .bind(f.check_kind.as_str())
    .bind(f.status.as_str())
    .bind(&f.detail)
    .bind(sql_timestamp(f.timestamp))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_batch(tx: &mut Transaction<'_, Sqlite>, batch: &Batch) -> sqlx::Result<()> {
    match batch {
        Batch::Weather(records) => {
            for r in records {
                insert_weather(tx, r).await?;
            }
        }
        Batch::AirQuality(records) => {
            for r in records {
                insert_air_quality(tx, r).await?;
            }
        }
        Batch::Forecast(records) => {
            for r in records {
                insert_forecast(tx, r).await?;
            }
        }
        Batch::QualityFindings(findings) => {
            for f in findings {
                insert_finding(tx, f).await?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Persister for SqliteStore {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PipelineError::schema(e.to_string()))?;
        }
        debug!("Schema verified ({} statements)", SCHEMA.len());
        Ok(())
    }

    #[instrument(skip(self, batch), fields(table = batch.table(), rows = batch.len()))]
    async fn append(&self, batch: &Batch) -> Result<u64> {
        let table = batch.table();
        let to_persistence = |e: sqlx::Error| PipelineError::persistence(table, e.to_string());

        let mut tx = self.pool.begin().await.map_err(to_persistence)?;
        write_batch(&mut tx, batch).await.map_err(to_persistence)?;
        tx.commit().await.map_err(to_persistence)?;

        debug!("Appended {} rows to {}", batch.len(), table);
        Ok(batch.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckKind, CheckStatus, Pollutants};
    use chrono::Duration;

    async fn memory_store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    fn weather(city: &str, temperature: f64) -> WeatherRecord {
        WeatherRecord {
            location: Some(city.to_string()),
            province: None,
            timestamp: Utc::now(),
            temperature: Some(temperature),
            humidity: Some(70),
            condition: Some("overcast clouds".into()),
            latitude: Some(52.0),
            longitude: Some(5.0),
            wind_speed: None,
            wind_direction: None,
            pressure: None,
            visibility_km: None,
            feels_like: None,
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = memory_store().await;
        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('weather_data', 'air_quality_data', 'weather_forecast', 'data_quality')",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(tables, 4);

        let indexes: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_weather_data_timestamp'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(indexes, 1);
    }

    #[tokio::test]
    async fn test_append_weather_and_read_back() {
        let store = memory_store().await;
        let batch = Batch::Weather(vec![weather("Amsterdam", 20.5), weather("Utrecht", 18.0)]);

        let written = store.append(&batch).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.count(WEATHER_TABLE).await.unwrap(), 2);

        let temperature: f64 =
            sqlx::query_scalar("SELECT temperature FROM weather_data WHERE city = 'Amsterdam'")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(temperature, 20.5);
    }

    #[tokio::test]
    async fn test_append_does_not_deduplicate() {
        let store = memory_store().await;
        let record = weather("Breda", 12.0);
        let batch = Batch::Weather(vec![record.clone(), record]);

        store.append(&batch).await.unwrap();
        store.append(&batch).await.unwrap();

        assert_eq!(store.count(WEATHER_TABLE).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_append_other_batches() {
        let store = memory_store().await;
        let now = Utc::now();

        let air = Batch::AirQuality(vec![AirQualityRecord {
            location: "Amsterdam".into(),
            latitude: 52.37,
            longitude: 4.90,
            aqi: Some(2),
            pollutants: Pollutants {
                pm2_5: Some(8.0),
                ..Pollutants::default()
            },
            timestamp: now,
        }]);
        let forecast = Batch::Forecast(vec![ForecastRecord {
            location: "Amsterdam".into(),
            forecast_date: now + Duration::hours(3),
            temperature: Some(19.0),
            humidity: Some(60),
            condition: None,
            created_at: now,
        }]);
        let findings = Batch::QualityFindings(vec![QualityFinding {
            target_table: WEATHER_TABLE.into(),
            check_kind: CheckKind::MissingData,
            status: CheckStatus::Passed,
            detail: "No missing critical data".into(),
            timestamp: now,
        }]);

        assert_eq!(store.append(&air).await.unwrap(), 1);
        assert_eq!(store.append(&forecast).await.unwrap(), 1);
        assert_eq!(store.append(&findings).await.unwrap(), 1);

        let rows = store.findings().await.unwrap();
        assert_eq!(rows[0].1, "missing_data");
        assert_eq!(rows[0].2, "passed");

        let counts = store.quality_counts_since(now - Duration::hours(1)).await.unwrap();
        assert_eq!(counts.get("passed"), Some(&1));
    }

    #[tokio::test]
    async fn test_latest_weather_timestamp() {
        let store = memory_store().await;
        assert!(store.latest_weather_timestamp().await.unwrap().is_none());

        let mut older = weather("Arnhem", 10.0);
        older.timestamp = Utc::now() - Duration::hours(5);
        let newer = weather("Nijmegen", 11.0);
        let expected = newer.timestamp;
        store
            .append(&Batch::Weather(vec![older, newer]))
            .await
            .unwrap();

        let latest = store.latest_weather_timestamp().await.unwrap().unwrap();
        assert_eq!(latest.timestamp_millis(), expected.timestamp_millis());
    }

    #[tokio::test]
    async fn test_timestamps_sort_chronologically_across_precisions() {
        let store = memory_store().await;
        let second = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let mut whole = weather("Enschede", 10.0);
        whole.timestamp = second;
        let mut fractional = weather("Zwolle", 11.0);
        fractional.timestamp = second + Duration::milliseconds(250);
        let mut finer = weather("Assen", 12.0);
        finer.timestamp = second + Duration::microseconds(250_001);
        store
            .append(&Batch::Weather(vec![finer.clone(), fractional, whole]))
            .await
            .unwrap();

        let texts: Vec<String> = sqlx::query_scalar("SELECT timestamp FROM weather_data")
            .fetch_all(store.pool())
            .await
            .unwrap();
        assert!(texts.iter().all(|t| t.len() == texts[0].len()));
        assert!(texts.iter().all(|t| t.ends_with('Z')));

        let latest = store.latest_weather_timestamp().await.unwrap().unwrap();
        assert_eq!(latest, finer.timestamp);

        let counts = store.weather_counts_by_day(second).await.unwrap();
        assert_eq!(counts.get("2023-11-14"), Some(&3));
        let later = store
            .weather_counts_by_day(second + Duration::milliseconds(1))
            .await
            .unwrap();
        assert_eq!(later.get("2023-11-14"), Some(&2));
    }

    #[tokio::test]
    async fn test_append_without_schema_is_persistence_error() {
        let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
        let err = store
            .append(&Batch::Weather(vec![weather("Haarlem", 9.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { ref table, .. } if table == WEATHER_TABLE));
    }
}
