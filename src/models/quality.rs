//! Data quality findings, persisted as an append-only audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which rule produced a finding
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    MissingData,
    TemperatureOutlier,
    DuplicateCheck,
}

impl CheckKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::MissingData => "missing_data",
            CheckKind::TemperatureOutlier => "temperature_outlier",
            CheckKind::DuplicateCheck => "duplicate_check",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rule evaluation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
}

impl CheckStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Warning => "warning",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single quality-rule evaluation outcome
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QualityFinding {
    pub target_table: String,
    pub check_kind: CheckKind,
    pub status: CheckStatus,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl QualityFinding {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Passed
    }

    /// Stable one-line description used in quality alerts
    #[must_use]
    pub fn issue_line(&self) -> String {
        format!(
            "[{}] {} {}: {}",
            self.target_table, self.check_kind, self.status, self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_line_format() {
        let finding = QualityFinding {
            target_table: "weather_data".into(),
            check_kind: CheckKind::DuplicateCheck,
            status: CheckStatus::Warning,
            detail: "Found 1 duplicate records".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(
            finding.issue_line(),
            "[weather_data] duplicate_check warning: Found 1 duplicate records"
        );
        assert!(!finding.passed());
    }

    #[test]
    fn test_serde_names_match_storage_strings() {
        let json = serde_json::to_string(&CheckKind::TemperatureOutlier).unwrap();
        assert_eq!(json, "\"temperature_outlier\"");
        let json = serde_json::to_string(&CheckStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }
}
