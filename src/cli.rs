use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use nl_weather_etl::store::Persister;
use nl_weather_etl::{
    EmailAlerts, EtlOrchestrator, HealthMonitor, OpenWeatherClient, PipelineConfig, SqliteStore,
    scheduler,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "nl-weather-etl",
    version,
    about = "Weather, air quality and forecast ETL for Dutch cities"
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "WEATHER_ETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Force debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute one ETL run and print its summary.
    Run,

    /// Run now, then once a day at `pipeline.daily_at` until interrupted.
    Schedule,

    /// Create the database schema and exit.
    InitDb,

    /// Print database health, data freshness, host resources and recent pipeline metrics.
    Health,
}

impl Command {
    fn needs_provider(&self) -> bool {
        matches!(self, Command::Run | Command::Schedule)
    }
}

impl Cli {
    /// Configuration for this invocation. Database-only commands skip validation.
    pub fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        if self.command.needs_provider() {
            PipelineConfig::load_from_path(self.config.clone())
        } else {
            PipelineConfig::resolve(self.config.clone())
        }
    }

    pub async fn run(self, config: PipelineConfig) -> anyhow::Result<()> {
        let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to open database")?;

        match self.command {
            Command::InitDb => {
                store.ensure_schema().await?;
                info!("Database schema is up to date");
            }
            Command::Health => {
                let monitor = HealthMonitor::new(store);
                let now = Utc::now();
                let report = serde_json::json!({
                    "database": monitor.check_database().await,
                    "data_freshness": monitor.check_data_freshness(now).await,
                    "system_resources": monitor.check_system_resources().await,
                    "weather_records_per_day": monitor.daily_weather_counts(now - Duration::days(7)).await,
                    "quality_last_24h": monitor.quality_summary(now - Duration::hours(24)).await,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Command::Run => {
                let orchestrator = build_orchestrator(&config, store)?;
                let summary = orchestrator.run_once().await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Command::Schedule => {
                let orchestrator = build_orchestrator(&config, store)?;
                let at = config.pipeline.daily_time()?;
                let shutdown = async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                };
                scheduler::run_daily(&orchestrator, at, shutdown).await?;
            }
        }

        Ok(())
    }
}

fn build_orchestrator(
    config: &PipelineConfig,
    store: SqliteStore,
) -> anyhow::Result<EtlOrchestrator> {
    let source = OpenWeatherClient::new(&config.provider)?;
    let alerts = EmailAlerts::new(config.alerts.clone());
    let health = HealthMonitor::new(store.clone());

    Ok(EtlOrchestrator::from_config(
        &config.pipeline,
        Arc::new(source),
        Arc::new(store),
        Arc::new(alerts),
    )
    .with_health_monitor(health))
}
