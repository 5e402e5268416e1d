//! Error types and handling for the weather ETL pipeline

use thiserror::Error;

/// Failure of a single request against the upstream data provider
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, DNS or TLS level failure
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// Provider answered with a non-2xx status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Body could not be decoded into the expected payload
    #[error("invalid payload from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Work unit ran past the run deadline
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream provider errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Failure writing one batch
    #[error("Persistence error on {table}: {message}")]
    Persistence { table: String, message: String },

    /// Schema initialization failure; fatal to a run
    #[error("Schema initialization failed: {message}")]
    Schema { message: String },

    /// Alert delivery errors
    #[error("Alert error: {message}")]
    Alert { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new persistence error for `table`
    pub fn persistence<T: Into<String>, S: Into<String>>(table: T, message: S) -> Self {
        Self::Persistence {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a new schema error
    pub fn schema<S: Into<String>>(message: S) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a new alert error
    pub fn alert<S: Into<String>>(message: S) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Schema { .. } | PipelineError::Config { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file and environment.")
            }
            PipelineError::Fetch(_) => {
                "Unable to reach the weather provider. Please check your network and API key."
                    .to_string()
            }
            PipelineError::Persistence { table, .. } => {
                format!("Writing to table '{table}' failed. Please check the database.")
            }
            PipelineError::Schema { .. } => {
                "Database schema could not be created. The run was aborted.".to_string()
            }
            PipelineError::Alert { message } => format!("Alert delivery failed: {message}"),
            PipelineError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = PipelineError::config("missing API key");
        assert!(matches!(config_err, PipelineError::Config { .. }));

        let persist_err = PipelineError::persistence("weather_data", "disk full");
        assert!(matches!(persist_err, PipelineError::Persistence { .. }));
        assert!(persist_err.to_string().contains("weather_data"));

        let schema_err = PipelineError::schema("locked");
        assert!(schema_err.is_fatal());
        assert!(!persist_err.is_fatal());
    }

    #[test]
    fn test_user_messages() {
        let config_err = PipelineError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let fetch_err: PipelineError = FetchError::Timeout { seconds: 30 }.into();
        assert!(fetch_err.user_message().contains("Unable to reach"));

        let schema_err = PipelineError::schema("boom");
        assert!(schema_err.user_message().contains("aborted"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
