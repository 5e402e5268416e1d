//! Data quality gate run over aggregated weather batches before persistence
//!
//! Findings are advisory: they are logged, written to the audit table and
//! surfaced as alerts, but never stop a batch from being stored.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{CheckKind, CheckStatus, QualityFinding, WeatherRecord};
use crate::store::{Batch, Persister};

/// Plausible temperature range for the monitored climate, inclusive
pub const MIN_PLAUSIBLE_TEMPERATURE: f64 = -20.0;
pub const MAX_PLAUSIBLE_TEMPERATURE: f64 = 45.0;

fn finding(
    table: &str,
    check_kind: CheckKind,
    status: CheckStatus,
    detail: String,
    now: DateTime<Utc>,
) -> QualityFinding {
    QualityFinding {
        target_table: table.to_string(),
        check_kind,
        status,
        detail,
        timestamp: now,
    }
}

/// Fails when any record lacks location, temperature or humidity
#[must_use]
pub fn check_missing_data(batch: &[WeatherRecord], table: &str, now: DateTime<Utc>) -> QualityFinding {
    let columns = [
        ("location", batch.iter().filter(|r| r.location.is_none()).count()),
        ("temperature", batch.iter().filter(|r| r.temperature.is_none()).count()),
        ("humidity", batch.iter().filter(|r| r.humidity.is_none()).count()),
    ];

    let missing: Vec<String> = columns
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(column, count)| format!("{column}={count}"))
        .collect();

    if missing.is_empty() {
        finding(
            table,
            CheckKind::MissingData,
            CheckStatus::Passed,
            "No missing critical data".into(),
            now,
        )
    } else {
        finding(
            table,
            CheckKind::MissingData,
            CheckStatus::Failed,
            format!("Missing data in columns: {}", missing.join(", ")),
            now,
        )
    }
}

/// Warns when a temperature lies outside the plausible range
#[must_use]
pub fn check_temperature_outliers(
    batch: &[WeatherRecord],
    table: &str,
    now: DateTime<Utc>,
) -> QualityFinding {
    let outliers: Vec<String> = batch
        .iter()
        .filter_map(|r| r.temperature.map(|t| (r, t)))
        .filter(|(_, t)| !(MIN_PLAUSIBLE_TEMPERATURE..=MAX_PLAUSIBLE_TEMPERATURE).contains(t))
        .map(|(r, t)| format!("{}={t:.1}", r.location.as_deref().unwrap_or("<unknown>")))
        .collect();

    if outliers.is_empty() {
        finding(
            table,
            CheckKind::TemperatureOutlier,
            CheckStatus::Passed,
            "No temperature outliers".into(),
            now,
        )
    } else {
        finding(
            table,
            CheckKind::TemperatureOutlier,
            CheckStatus::Warning,
            format!("Temperature outliers found: {}", outliers.join(", ")),
            now,
        )
    }
}

/// Warns when a (location, timestamp) pair occurs more than once
#[must_use]
pub fn check_duplicates(batch: &[WeatherRecord], table: &str, now: DateTime<Utc>) -> QualityFinding {
    let mut occurrences: HashMap<(Option<&str>, DateTime<Utc>), usize> = HashMap::new();
    for record in batch {
        *occurrences
            .entry((record.location.as_deref(), record.timestamp))
            .or_default() += 1;
    }
    let duplicates: usize = occurrences.values().map(|n| n - 1).sum();

    if duplicates == 0 {
        finding(
            table,
            CheckKind::DuplicateCheck,
            CheckStatus::Passed,
            "No duplicates found".into(),
            now,
        )
    } else {
        finding(
            table,
            CheckKind::DuplicateCheck,
            CheckStatus::Warning,
            format!("Found {duplicates} duplicate records"),
            now,
        )
    }
}

/// Runs every rule over a batch and records each finding in the audit table
pub struct QualityGate {
    store: Arc<dyn Persister>,
}

impl QualityGate {
    pub fn new(store: Arc<dyn Persister>) -> Self {
        Self { store }
    }

    /// Evaluate all rules. Every finding is returned, passing ones included.
    pub async fn evaluate(&self, batch: &[WeatherRecord], table: &str) -> Vec<QualityFinding> {
        let now = Utc::now();
        let findings = vec![
            check_missing_data(batch, table, now),
            check_temperature_outliers(batch, table, now),
            check_duplicates(batch, table, now),
        ];

        for f in &findings {
            if f.passed() {
                info!("Data quality check {} for {}: {}", f.check_kind, table, f.status);
            } else {
                warn!(
                    "Data quality check {} for {}: {} ({})",
                    f.check_kind, table, f.status, f.detail
                );
            }
        }

        if let Err(e) = self
            .store
            .append(&Batch::QualityFindings(findings.clone()))
            .await
        {
            warn!("Failed to record quality findings for {}: {}", table, e);
        }

        findings
    }
}
