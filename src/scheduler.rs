//! Daily scheduling of orchestrator runs

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use std::future::Future;
use tracing::{error, info};

use crate::orchestrator::EtlOrchestrator;
use crate::Result;

/// First occurrence of `at` strictly after `now`
#[must_use]
pub fn next_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

async fn run_logged(orchestrator: &EtlOrchestrator) -> Result<()> {
    match orchestrator.run_once().await {
        Ok(summary) => {
            info!(
                "Scheduled run finished: {} succeeded, {} failed",
                summary.succeeded.len(),
                summary.failed.len()
            );
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!("Scheduled run failed: {}", e);
            Ok(())
        }
    }
}

/// Run immediately, then every day at local time `at`, until `shutdown`
/// resolves. A fatal run error stops the schedule.
pub async fn run_daily<F>(orchestrator: &EtlOrchestrator, at: NaiveTime, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    run_logged(orchestrator).await?;

    loop {
        let now = Local::now().naive_local();
        let next = next_run(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next scheduled run at {}", next);

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {
                run_logged(orchestrator).await?;
            }
        }
    }
}
