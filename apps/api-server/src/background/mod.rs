//! Background jobs.

mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig};

use std::sync::Arc;

use tokio_cron_scheduler::JobSchedulerError;
use vitae_infra::RateLimitService;

/// Register the idle-bucket sweep on `schedule`.
pub async fn register_sweep(
    scheduler: &Scheduler,
    schedule: &str,
    limiter: Arc<RateLimitService>,
) -> Result<uuid::Uuid, JobSchedulerError> {
    scheduler
        .add_cron(schedule, move || {
            let limiter = limiter.clone();
            async move {
                let removed = limiter.sweep().await;
                tracing::info!(removed, "Rate limit sweep finished");
            }
        })
        .await
}
