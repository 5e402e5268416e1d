//! Binary entry point for the weather ETL pipeline

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nl_weather_etl::PipelineError;
use nl_weather_etl::config::LoggingConfig;

mod cli;

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.load_config()?;

    init_tracing(&config.logging, cli.verbose);
    info!(
        "Starting nl-weather-etl v{} ({} locations)",
        nl_weather_etl::VERSION,
        config.pipeline.locations.len()
    );

    if let Err(e) = cli.run(config).await {
        if let Some(pipeline_error) = e.downcast_ref::<PipelineError>() {
            error!("{}", pipeline_error.user_message());
        }
        return Err(e);
    }

    Ok(())
}
