use std::sync::Arc;

use tgwh_classifier::ObjectDetector;
use tgwh_collector::ChannelSource;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::run::{PipelineRun, RunState, StageKind, StageResult, StageStatus, TriggerSource};
use crate::stages;
use crate::transform::Transformer;
use crate::warehouse::WarehouseConnector;

/// Drives the fixed `collect -> load -> transform -> classify` chain.
///
/// Collaborators are injected so runs can be exercised without a network,
/// a detector service, a transform tool or a database.
#[derive(Clone)]
pub struct Orchestrator {
    source: Arc<dyn ChannelSource>,
    detector: Arc<dyn ObjectDetector>,
    transformer: Arc<dyn Transformer>,
    warehouse: Arc<dyn WarehouseConnector>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ChannelSource>,
        detector: Arc<dyn ObjectDetector>,
        transformer: Arc<dyn Transformer>,
        warehouse: Arc<dyn WarehouseConnector>,
    ) -> Self {
        Self {
            source,
            detector,
            transformer,
            warehouse,
        }
    }

    /// Execute one full pipeline run.
    ///
    /// Never fails: the outcome, including which stage failed and why, is in
    /// the returned [`PipelineRun`]. The run is recorded in the warehouse
    /// ledger on a best-effort basis.
    pub async fn run(
        &self,
        config: &RunConfig,
        trigger: TriggerSource,
        cancel: &CancellationToken,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(trigger);
        let span = tracing::info_span!("pipeline_run", run_id = %run.run_id, trigger = %trigger);

        async {
            tracing::info!(channels = config.channels.len(), "pipeline run started");
            self.execute(&mut run, config, cancel).await;
            self.record(&run).await;
            tracing::info!(
                state = %run.state,
                failed_stage = ?run.failed_stage.map(StageKind::as_str),
                error = ?run.error,
                "pipeline run finished"
            );
        }
        .instrument(span)
        .await;

        run
    }

    async fn execute(&self, run: &mut PipelineRun, config: &RunConfig, cancel: &CancellationToken) {
        for stage in StageKind::ORDER {
            if cancel.is_cancelled() {
                abort(run, stage, "interrupted");
                return;
            }
            if let Err(e) = run.transition(stage.run_state()) {
                tracing::error!(error = %e, "run state machine rejected stage start");
                return;
            }

            let upstream = run.stages.last().cloned();
            match self.stage(stage, config, upstream.as_ref(), cancel).await {
                Ok(result) => run.stages.push(result),
                Err(e) => {
                    let reason = match e {
                        PipelineError::Interrupted => "interrupted".to_string(),
                        other => other.to_string(),
                    };
                    run.stages.push(StageResult::failed(stage, reason.clone()));
                    abort(run, stage, reason);
                    return;
                }
            }
        }

        if let Err(e) = run.transition(RunState::Complete) {
            tracing::error!(error = %e, "run state machine rejected completion");
        }
    }

    async fn stage(
        &self,
        stage: StageKind,
        config: &RunConfig,
        upstream: Option<&StageResult>,
        cancel: &CancellationToken,
    ) -> Result<StageResult, PipelineError> {
        let span = tracing::info_span!("stage", stage = %stage);
        async {
            tracing::info!("stage started");
            let result = match stage {
                StageKind::Collect => stages::collect(Arc::clone(&self.source), config, cancel).await,
                StageKind::Load => Ok(stages::load(self.warehouse.as_ref(), config, upstream).await),
                StageKind::Transform => {
                    stages::transform(self.transformer.as_ref(), config, upstream).await
                }
                StageKind::Classify => Ok(stages::classify(
                    Arc::clone(&self.detector),
                    self.warehouse.as_ref(),
                    config,
                    upstream,
                )
                .await),
            };
            if let Ok(r) = &result {
                log_stage_result(r);
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run only the collect stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Interrupted`] if cancelled mid-collection.
    pub async fn collect(
        &self,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<StageResult, PipelineError> {
        self.stage(StageKind::Collect, config, None, cancel).await
    }

    /// Run only the load stage.
    ///
    /// # Errors
    ///
    /// Stage-local failures are reported in the result; this never returns `Err`.
    pub async fn load(&self, config: &RunConfig) -> Result<StageResult, PipelineError> {
        self.stage(StageKind::Load, config, None, &CancellationToken::new())
            .await
    }

    /// Run only the transform stage.
    ///
    /// # Errors
    ///
    /// Returns an error when the transform exits non-zero or times out.
    pub async fn transform(&self, config: &RunConfig) -> Result<StageResult, PipelineError> {
        self.stage(StageKind::Transform, config, None, &CancellationToken::new())
            .await
    }

    /// Run only the classify stage.
    ///
    /// # Errors
    ///
    /// Stage-local failures are reported in the result; this never returns `Err`.
    pub async fn classify(&self, config: &RunConfig) -> Result<StageResult, PipelineError> {
        self.stage(StageKind::Classify, config, None, &CancellationToken::new())
            .await
    }

    async fn record(&self, run: &PipelineRun) {
        let session = match self.warehouse.connect().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "could not record pipeline run");
                return;
            }
        };

        let recorded = match session.ensure_schema().await {
            Ok(()) => session.record_run(&run.to_record()).await,
            Err(e) => Err(e),
        };
        session.close().await;

        if let Err(e) = recorded {
            tracing::warn!(error = %e, "could not record pipeline run");
        }
    }
}

fn abort(run: &mut PipelineRun, stage: StageKind, reason: impl Into<String>) {
    let reason = reason.into();
    tracing::error!(stage = %stage, reason = %reason, "pipeline run failed");
    if let Err(e) = run.fail(stage, reason) {
        tracing::error!(error = %e, "run state machine rejected failure");
    }
}

fn log_stage_result(result: &StageResult) {
    let message = result.message.as_deref().unwrap_or("");
    match result.status {
        StageStatus::Success => tracing::info!(status = %result.status, "stage finished"),
        StageStatus::Skipped => {
            tracing::warn!(status = %result.status, reason = message, "stage skipped");
        }
        StageStatus::Failed => {
            tracing::error!(status = %result.status, reason = message, "stage failed");
        }
    }
}
