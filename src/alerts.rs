//! Alert notifications for extreme weather, pipeline failures and quality issues
//!
//! Dispatch is fire-and-forget: delivery problems are logged, never returned.

use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    Message, Transport, message::Mailbox, transport::smtp::SmtpTransport,
    transport::smtp::authentication::Credentials,
};
use tokio::task;
use tracing::{error, info, warn};

use crate::config::AlertConfig;
use crate::{PipelineError, Result};

/// Temperatures above this trigger a weather alert
pub const EXTREME_HEAT_CELSIUS: f64 = 35.0;
/// Temperatures below this trigger a weather alert
pub const EXTREME_COLD_CELSIUS: f64 = -10.0;

#[must_use]
pub fn is_extreme_temperature(temperature: f64) -> bool {
    temperature > EXTREME_HEAT_CELSIUS || temperature < EXTREME_COLD_CELSIUS
}

#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn weather_alert(&self, location: &str, temperature: f64, condition: &str);

    /// `source` names what failed: a location or a table
    async fn pipeline_failure_alert(&self, source: &str, error: &str);

    async fn quality_alert(&self, issues: &[String]);
}

/// Rendered notification
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    #[must_use]
    pub fn weather(location: &str, temperature: f64, condition: &str) -> Self {
        Self {
            subject: format!("Extreme Weather Alert - {location}"),
            body: format!(
                "Extreme weather detected in {location}:\n\n\
                 Temperature: {temperature:.1}°C\n\
                 Condition: {condition}\n\
                 Time: {}\n\n\
                 Please take appropriate precautions.",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }

    #[must_use]
    pub fn pipeline_failure(source: &str, error: &str) -> Self {
        Self {
            subject: "ETL Pipeline Failure Alert".to_string(),
            body: format!(
                "The Weather ETL Pipeline has encountered an error:\n\n\
                 Error: {source}: {error}\n\
                 Time: {}\n\n\
                 Please check the logs and take corrective action.",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }

    #[must_use]
    pub fn quality(issues: &[String]) -> Self {
        let lines: Vec<String> = issues.iter().map(|issue| format!("- {issue}")).collect();
        Self {
            subject: "Data Quality Issues Detected".to_string(),
            body: format!(
                "Data quality issues detected in the Weather ETL Pipeline:\n\n\
                 Issues:\n{}\n\n\
                 Time: {}\n\n\
                 Please review the data quality logs.",
                lines.join("\n"),
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }
}

/// Sends alerts over SMTP with STARTTLS; logs only when not configured
pub struct EmailAlerts {
    config: AlertConfig,
}

impl EmailAlerts {
    #[must_use]
    pub fn new(config: AlertConfig) -> Self {
        if !config.is_complete() {
            warn!("Email configuration incomplete. Alerts will only be logged.");
        }
        Self { config }
    }

    fn create_mailer(&self) -> Result<SmtpTransport> {
        let user = self.config.email_user.clone().unwrap_or_default();
        let password = self.config.email_password.clone().unwrap_or_default();
        let credentials = Credentials::new(user, password);

        let mailer = SmtpTransport::starttls_relay(&self.config.smtp_server)
            .map_err(|e| PipelineError::alert(format!("Invalid SMTP relay: {e}")))?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(mailer)
    }

    fn build_message(&self, alert: &Alert) -> Result<Message> {
        let from: Mailbox = format!(
            "Weather ETL <{}>",
            self.config.email_user.as_deref().unwrap_or_default()
        )
        .parse()
        .map_err(|e| PipelineError::alert(format!("Failed to parse from address: {e}")))?;

        let mut builder = Message::builder().from(from).subject(alert.subject.clone());
        for recipient in self.config.recipients.iter().filter(|r| !r.trim().is_empty()) {
            let to: Mailbox = recipient.trim().parse().map_err(|e| {
                PipelineError::alert(format!("Failed to parse to address '{recipient}': {e}"))
            })?;
            builder = builder.to(to);
        }

        builder
            .body(alert.body.clone())
            .map_err(|e| PipelineError::alert(format!("Failed to build message: {e}")))
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let email = self.build_message(alert)?;
        let mailer = self.create_mailer()?;

        task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| PipelineError::alert(format!("Mail task failed: {e}")))?
            .map_err(|e| PipelineError::alert(format!("Failed to send email: {e}")))?;

        Ok(())
    }

    async fn deliver(&self, alert: Alert) {
        if !self.config.is_complete() {
            warn!("Email configuration incomplete. Alert not sent: {}", alert.subject);
            return;
        }

        match self.send(&alert).await {
            Ok(()) => info!("Alert email sent: {}", alert.subject),
            Err(e) => error!("Failed to send email alert '{}': {}", alert.subject, e),
        }
    }
}

#[async_trait]
impl AlertDispatcher for EmailAlerts {
    async fn weather_alert(&self, location: &str, temperature: f64, condition: &str) {
        warn!(
            "Extreme temperature in {}: {:.1}°C ({})",
            location, temperature, condition
        );
        self.deliver(Alert::weather(location, temperature, condition))
            .await;
    }

    async fn pipeline_failure_alert(&self, source: &str, error: &str) {
        self.deliver(Alert::pipeline_failure(source, error)).await;
    }

    async fn quality_alert(&self, issues: &[String]) {
        if issues.is_empty() {
            return;
        }
        self.deliver(Alert::quality(issues)).await;
    }
}
