// src/services/scheduler.rs
use anyhow::Result;
use log::{error, info};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::Config;
use super::store::{reload_from_csv, ProjectStore};

/// Reloads the transaction CSV on `config.reload_cron` (UTC).
///
/// Engines are rebuilt with a fresh `now`, so the time windows roll forward
/// even when the file itself has not changed. A failed reload keeps the
/// previous engines in place.
pub async fn start_reload_job(store: Arc<ProjectStore>, config: Config) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;
    let schedule = config.reload_cron.clone();

    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let store = store.clone();
        let config = config.clone();
        Box::pin(async move {
            info!("Scheduled reload of {}", config.transactions_csv.display());
            match reload_from_csv(&store, &config).await {
                Ok(version) => info!("Scheduled reload complete, data version {}", version),
                Err(e) => error!("Scheduled reload failed, keeping previous data: {:#}", e),
            }
        })
    })?;

    sched.add(job).await?;
    sched.start().await?;
    info!("Reload job scheduled with cron '{}'", schedule);
    Ok(sched)
}
