//! Fixed-interval trigger backed by tokio-cron-scheduler.

use crate::coordinator::{Coordinator, Trigger};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::info;

/// Register the watch job on `schedule` (six-field cron, seconds first) and
/// start the scheduler.
///
/// A tick that lands while a cycle is running is dropped by the
/// coordinator, not queued.
pub async fn start_scheduler(
    coordinator: Arc<Coordinator>,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let coordinator = Arc::clone(&coordinator);
        Box::pin(async move {
            info!("📅 scheduled cycle triggered");
            coordinator.run_cycle(Trigger::Schedule).await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("⏰ scheduler started ({schedule})");
    Ok(scheduler)
}
