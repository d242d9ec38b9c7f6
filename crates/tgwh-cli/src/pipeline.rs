//! Pipeline command handlers for the CLI.
//!
//! Each handler builds the production collaborators from `AppConfig` and
//! hands them to the orchestrator. Stage-local failures are printed; only a
//! failed run or a fatal stage error turns into a non-zero exit.

use std::sync::Arc;

use chrono::NaiveDate;
use tgwh_classifier::HttpDetector;
use tgwh_collector::HttpChannelSource;
use tgwh_core::AppConfig;
use tgwh_pipeline::{
    DbtTransformer, Orchestrator, PgWarehouse, PipelineRun, RunConfig, RunState, StageResult,
    StageStatus, TriggerSource,
};
use tokio_util::sync::CancellationToken;

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let source = HttpChannelSource::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build channel source client: {e}"))?;
    let detector = HttpDetector::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build detector client: {e}"))?;

    Ok(Orchestrator::new(
        Arc::new(source),
        Arc::new(detector),
        Arc::new(DbtTransformer::from_settings(&config.transform)),
        Arc::new(PgWarehouse::from_app_config(config)),
    ))
}

/// Run configuration with the channel list from the channels file.
fn run_config_with_channels(config: &AppConfig, limit: Option<usize>) -> anyhow::Result<RunConfig> {
    let channels = tgwh_core::load_channels(&config.channels_path)?;
    let mut run_config = RunConfig::from_app_config(config, &channels);
    if let Some(limit) = limit {
        run_config.limit = limit;
    }
    Ok(run_config)
}

fn print_stage(result: &StageResult) {
    match &result.message {
        Some(message) => println!("{:<10} {:<8} {message}", result.stage, result.status),
        None => println!("{:<10} {}", result.stage, result.status),
    }
}

fn print_stage_with_stats(result: &StageResult) -> anyhow::Result<()> {
    print_stage(result);
    if !result.stats.is_null() {
        println!("{}", serde_json::to_string_pretty(&result.stats)?);
    }
    Ok(())
}

fn finish_run(run: &PipelineRun) -> anyhow::Result<()> {
    println!("run {} ({})", run.run_id, run.trigger);
    for stage in &run.stages {
        print_stage(stage);
    }

    if run.state == RunState::Failed {
        let stage = run
            .failed_stage
            .map_or_else(|| "unknown".to_string(), |s| s.to_string());
        let reason = run.error.as_deref().unwrap_or("no reason recorded");
        anyhow::bail!("pipeline run {} failed at {stage}: {reason}", run.run_id);
    }
    println!("run {} {}", run.run_id, run.state);
    Ok(())
}

/// `tgwh run`: one full pipeline run started from the command line.
pub(crate) async fn run_full(
    config: &AppConfig,
    limit: Option<usize>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let run_config = run_config_with_channels(config, limit)?;
    let orchestrator = build_orchestrator(config)?;
    let run = orchestrator
        .run(&run_config, TriggerSource::Cli, cancel)
        .await;
    finish_run(&run)
}

/// `tgwh collect`
pub(crate) async fn run_collect(
    config: &AppConfig,
    limit: Option<usize>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let run_config = run_config_with_channels(config, limit)?;
    let result = build_orchestrator(config)?
        .collect(&run_config, cancel)
        .await?;
    print_stage_with_stats(&result)
}

/// `tgwh load [--date]`
pub(crate) async fn run_load(config: &AppConfig, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let mut run_config = RunConfig::from_app_config(config, &[]);
    run_config.date = date;
    let result = build_orchestrator(config)?.load(&run_config).await?;
    print_stage_with_stats(&result)?;
    if result.status == StageStatus::Failed {
        anyhow::bail!("load failed");
    }
    Ok(())
}

/// `tgwh transform`
pub(crate) async fn run_transform(config: &AppConfig) -> anyhow::Result<()> {
    let run_config = RunConfig::from_app_config(config, &[]);
    let result = build_orchestrator(config)?.transform(&run_config).await?;
    print_stage_with_stats(&result)
}

/// `tgwh classify [--rescan]`
pub(crate) async fn run_classify(config: &AppConfig, rescan: bool) -> anyhow::Result<()> {
    let mut run_config = RunConfig::from_app_config(config, &[]);
    run_config.rescan = rescan;
    let result = build_orchestrator(config)?.classify(&run_config).await?;
    print_stage_with_stats(&result)?;
    if result.status == StageStatus::Failed {
        anyhow::bail!("classification failed");
    }
    Ok(())
}

/// `tgwh schedule`: keep the cron job registered until Ctrl-C.
pub(crate) async fn run_schedule(config: &AppConfig, cancel: &CancellationToken) -> anyhow::Result<()> {
    if !config.schedule.enabled {
        anyhow::bail!("pipeline schedule is disabled; set TGWH_SCHEDULE_ENABLED=true to host it");
    }

    let run_config = run_config_with_channels(config, None)?;
    let orchestrator = Arc::new(build_orchestrator(config)?);
    let Some(mut scheduler) = tgwh_pipeline::build_scheduler(
        orchestrator,
        &config.schedule,
        run_config,
        cancel.clone(),
    )
    .await?
    else {
        return Ok(());
    };

    println!("pipeline scheduled with `{}`; press Ctrl-C to stop", config.schedule.cron);
    cancel.cancelled().await;

    tracing::info!("stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
