//! Schedule and manual-trigger entry points.

use std::sync::Arc;

use tgwh_core::ScheduleSettings;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;
use crate::run::{PipelineRun, TriggerSource};

/// Builds and starts the pipeline scheduler.
///
/// Returns `Ok(None)` when scheduling is disabled. Otherwise the returned
/// [`JobScheduler`] must be kept alive for as long as runs should fire;
/// dropping it stops the job.
///
/// # Errors
///
/// Returns [`PipelineError::Schedule`] if the cron expression is invalid or
/// the scheduler cannot be started.
pub async fn build_scheduler(
    orchestrator: Arc<Orchestrator>,
    settings: &ScheduleSettings,
    config: RunConfig,
    cancel: CancellationToken,
) -> Result<Option<JobScheduler>, PipelineError> {
    if !settings.enabled {
        tracing::info!("pipeline schedule disabled");
        return Ok(None);
    }

    let scheduler = JobScheduler::new().await?;
    let config = Arc::new(config);

    let job = Job::new_async(settings.cron.as_str(), move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        let config = Arc::clone(&config);
        let cancel = cancel.clone();

        Box::pin(async move {
            if cancel.is_cancelled() {
                return;
            }
            tracing::info!("scheduler: starting pipeline run");
            let run = orchestrator
                .run(&config, TriggerSource::Schedule, &cancel)
                .await;
            tracing::info!(run_id = %run.run_id, state = %run.state, "scheduler: pipeline run complete");
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron = %settings.cron, "pipeline schedule registered");
    Ok(Some(scheduler))
}

/// Start a run immediately with the given configuration.
pub async fn manual_trigger(
    orchestrator: &Orchestrator,
    config: &RunConfig,
    cancel: &CancellationToken,
) -> PipelineRun {
    orchestrator.run(config, TriggerSource::Manual, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_cron_expression_is_accepted() {
        let job = Job::new_async("0 0 2 * * *", |_uuid, _lock| Box::pin(async {}));
        assert!(job.is_ok());
    }

    #[tokio::test]
    async fn malformed_cron_expression_is_rejected() {
        let job = Job::new_async("every night", |_uuid, _lock| Box::pin(async {}));
        assert!(job.is_err());
    }
}
