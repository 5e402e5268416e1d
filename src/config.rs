//! Configuration management for the weather ETL pipeline
//!
//! Handles loading configuration from a TOML file and environment variables,
//! and provides validation for all configuration settings.

use crate::{PipelineError, Result};
use anyhow::Context;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::DEFAULT_LOCATIONS;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "weather-etl.toml";

/// Upper bound for `pipeline.run_timeout_seconds`, one day
pub const MAX_RUN_TIMEOUT_SECONDS: u64 = 86_400;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upstream data provider settings
    pub provider: ProviderConfig,
    /// Persistence backend settings
    pub database: DatabaseConfig,
    /// Orchestration settings
    pub pipeline: RunConfig,
    /// E-mail alert settings
    pub alerts: AlertConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// OpenWeatherMap API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key; usually supplied via `OPENWEATHER_API_KEY`
    pub api_key: Option<String>,
    /// Base URL for the data API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of retries for transient failures
    pub max_retries: u32,
    /// Unit system requested from the provider
    pub units: String,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

/// Orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Fixed set of monitored locations
    pub locations: Vec<String>,
    /// Number of concurrent per-location work units
    pub workers: usize,
    /// Upper bound on the wall-clock time of the fan-out step
    pub run_timeout_seconds: u64,
    /// Forecast steps kept per location
    pub forecast_entries: usize,
    /// Local time of the daily scheduled run, `HH:MM`
    pub daily_at: String,
}

/// SMTP alert settings. Delivery is disabled unless user and recipients are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub email_user: Option<String>,
    pub email_password: Option<String>,
    pub recipients: Vec<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

// Default value functions
fn default_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_database_url() -> String {
    "sqlite://weather.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_locations() -> Vec<String> {
    DEFAULT_LOCATIONS.iter().map(|s| (*s).to_string()).collect()
}

fn default_workers() -> usize {
    5
}

fn default_run_timeout() -> u64 {
    300
}

fn default_forecast_entries() -> usize {
    5
}

fn default_daily_at() -> String {
    "07:00".to_string()
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            units: default_units(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            workers: default_workers(),
            run_timeout_seconds: default_run_timeout(),
            forecast_entries: default_forecast_entries(),
            daily_at: default_daily_at(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            email_user: None,
            email_password: None,
            recipients: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl RunConfig {
    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }

    /// Parsed `daily_at`
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|_| {
            PipelineError::config(format!(
                "Invalid daily_at '{}'. Expected HH:MM",
                self.daily_at
            ))
        })
    }
}

impl AlertConfig {
    /// Whether enough is configured to attempt delivery
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.email_user.as_deref().is_some_and(|u| !u.is_empty())
            && self.recipients.iter().any(|r| !r.trim().is_empty())
    }
}

impl PipelineConfig {
    /// Load configuration from specified path and validate it for a full run
    pub fn load_from_path(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = Self::resolve(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// File, environment and defaults, without validation. Enough for
    /// commands that only touch the database.
    pub fn resolve(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_file = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if config_file.exists() {
            Self::from_file(&config_file)?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_file.display());
            Self::default()
        };

        // Environment variables win over the file
        config.apply_env(|key| std::env::var(key).ok());

        // Apply defaults for missing values
        config.apply_defaults();

        Ok(config)
    }

    /// Parse a TOML config file without applying overrides
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: PipelineConfig =
            toml::from_str(contents).context("Failed to deserialize configuration")?;
        Ok(config)
    }

    /// Apply the environment overrides used by deployments
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENWEATHER_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(server) = lookup("SMTP_SERVER") {
            self.alerts.smtp_server = server;
        }
        if let Some(port) = lookup("SMTP_PORT") {
            match port.trim().parse() {
                Ok(port) => self.alerts.smtp_port = port,
                Err(_) => tracing::warn!("Ignoring invalid SMTP_PORT '{}'", port),
            }
        }
        if let Some(user) = lookup("EMAIL_USER") {
            self.alerts.email_user = Some(user);
        }
        if let Some(password) = lookup("EMAIL_PASSWORD") {
            self.alerts.email_password = Some(password);
        }
        if let Some(recipients) = lookup("ALERT_RECIPIENTS") {
            self.alerts.recipients = recipients
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.provider.base_url.is_empty() {
            self.provider.base_url = default_base_url();
        }
        if self.provider.timeout_seconds == 0 {
            self.provider.timeout_seconds = default_timeout();
        }
        if self.provider.units.is_empty() {
            self.provider.units = default_units();
        }
        if self.database.url.is_empty() {
            self.database.url = default_database_url();
        }
        if self.database.max_connections == 0 {
            self.database.max_connections = default_max_connections();
        }
        if self.pipeline.workers == 0 {
            self.pipeline.workers = default_workers();
        }
        if self.pipeline.forecast_entries == 0 {
            self.pipeline.forecast_entries = default_forecast_entries();
        }
        if self.pipeline.daily_at.is_empty() {
            self.pipeline.daily_at = default_daily_at();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_locations()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the provider credential
    pub fn validate_api_key(&self) -> Result<()> {
        match self.provider.api_key.as_deref().map(str::trim) {
            None | Some("") => Err(PipelineError::config(
                "Missing OpenWeatherMap API key. Set OPENWEATHER_API_KEY or provider.api_key",
            )),
            Some(key) if key.len() < 8 => Err(PipelineError::config(
                "OpenWeatherMap API key appears to be invalid (too short)",
            )),
            Some(_) => Ok(()),
        }
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.provider.timeout_seconds > 300 {
            return Err(PipelineError::config(
                "Provider timeout cannot exceed 300 seconds",
            ));
        }

        if self.provider.max_retries > 10 {
            return Err(PipelineError::config("Provider max retries cannot exceed 10"));
        }

        if !(1..=32).contains(&self.pipeline.workers) {
            return Err(PipelineError::config("Worker count must be between 1 and 32"));
        }

        if !(1..=MAX_RUN_TIMEOUT_SECONDS).contains(&self.pipeline.run_timeout_seconds) {
            return Err(PipelineError::config(format!(
                "Run timeout must be between 1 and {MAX_RUN_TIMEOUT_SECONDS} seconds"
            )));
        }

        Ok(())
    }

    fn validate_locations(&self) -> Result<()> {
        if self.pipeline.locations.is_empty() {
            return Err(PipelineError::config("At least one location is required"));
        }

        let mut seen = HashSet::new();
        for name in &self.pipeline.locations {
            let key = name.trim().to_lowercase();
            if key.is_empty() {
                return Err(PipelineError::config("Location names cannot be empty"));
            }
            if !seen.insert(key) {
                return Err(PipelineError::config(format!(
                    "Duplicate location '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(PipelineError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(PipelineError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            )));
        }

        if !self.provider.base_url.starts_with("http://")
            && !self.provider.base_url.starts_with("https://")
        {
            return Err(PipelineError::config(
                "Provider base URL must be a valid HTTP or HTTPS URL",
            ));
        }

        self.pipeline.daily_time()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn valid_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.provider.api_key = Some("valid_api_key_123".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.provider.base_url,
            "https://api.openweathermap.org/data/2.5"
        );
        assert_eq!(config.provider.timeout_seconds, 30);
        assert_eq!(config.pipeline.workers, 5);
        assert_eq!(config.pipeline.forecast_entries, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.provider.api_key.is_none());
        assert!(!config.alerts.is_complete());
    }

    #[test]
    fn test_config_validation_missing_api_key() {
        let config = PipelineConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Missing OpenWeatherMap API key"));
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = valid_config();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(300, true)]
    #[case(86_400, true)]
    #[case(86_401, false)]
    #[case(u64::MAX, false)]
    fn test_run_timeout_bounds(#[case] seconds: u64, #[case] valid: bool) {
        let mut config = valid_config();
        config.pipeline.run_timeout_seconds = seconds;
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_huge_run_timeout_from_toml_is_rejected() {
        let mut config = PipelineConfig::from_toml(
            r#"
            [provider]
            api_key = "abcdefgh12345"

            [pipeline]
            run_timeout_seconds = 9223372036854775807
            "#,
        )
        .unwrap();
        config.apply_defaults();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Run timeout must be between"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = valid_config();
        config.provider.timeout_seconds = 500;
        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("timeout cannot exceed")
        );

        let mut config = valid_config();
        config.pipeline.workers = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_duplicate_locations() {
        let mut config = valid_config();
        config.pipeline.locations = vec!["Amsterdam".into(), "amsterdam ".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate location"));
    }

    #[test]
    fn test_config_validation_daily_at() {
        let mut config = valid_config();
        config.pipeline.daily_at = "7 o'clock".into();
        assert!(config.validate().is_err());

        config.pipeline.daily_at = "06:30".into();
        assert_eq!(
            config.pipeline.daily_time().unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_environment_variable_override() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENWEATHER_API_KEY", "test_key_from_env"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("SMTP_PORT", "2525"),
            ("EMAIL_USER", "etl@example.com"),
            ("ALERT_RECIPIENTS", "ops@example.com, ,oncall@example.com"),
        ]);

        let mut config = PipelineConfig::default();
        config.apply_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            config.provider.api_key.as_deref(),
            Some("test_key_from_env")
        );
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.alerts.smtp_port, 2525);
        assert_eq!(
            config.alerts.recipients,
            vec!["ops@example.com".to_string(), "oncall@example.com".to_string()]
        );
        assert!(config.alerts.is_complete());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [provider]
            api_key = "abcdefgh12345"

            [pipeline]
            locations = ["Amsterdam", "Zwolle"]
            workers = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.locations.len(), 2);
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.run_timeout_seconds, 300);
        assert_eq!(config.provider.timeout_seconds, 30);
        assert_eq!(config.alerts.smtp_server, "smtp.gmail.com");
        assert!(config.validate().is_ok());
    }
}
