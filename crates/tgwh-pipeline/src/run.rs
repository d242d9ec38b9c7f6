//! Pipeline run state, stage results and the run ledger record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Schedule,
    Cli,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Schedule => "schedule",
            TriggerSource::Cli => "cli",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Collecting,
    Loading,
    Transforming,
    Classifying,
    Complete,
    Failed,
}

impl RunState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Collecting => "collecting",
            RunState::Loading => "loading",
            RunState::Transforming => "transforming",
            RunState::Classifying => "classifying",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }

    /// The state that follows this one on the success path.
    #[must_use]
    pub fn next(self) -> Option<RunState> {
        match self {
            RunState::Pending => Some(RunState::Collecting),
            RunState::Collecting => Some(RunState::Loading),
            RunState::Loading => Some(RunState::Transforming),
            RunState::Transforming => Some(RunState::Classifying),
            RunState::Classifying => Some(RunState::Complete),
            RunState::Complete | RunState::Failed => None,
        }
    }

    fn can_move_to(self, to: RunState) -> bool {
        if to == RunState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Collect,
    Load,
    Transform,
    Classify,
}

impl StageKind {
    pub const ORDER: [StageKind; 4] = [
        StageKind::Collect,
        StageKind::Load,
        StageKind::Transform,
        StageKind::Classify,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Collect => "collect",
            StageKind::Load => "load",
            StageKind::Transform => "transform",
            StageKind::Classify => "classify",
        }
    }

    /// Run state while this stage executes.
    #[must_use]
    pub fn run_state(self) -> RunState {
        match self {
            StageKind::Collect => RunState::Collecting,
            StageKind::Load => RunState::Loading,
            StageKind::Transform => RunState::Transforming,
            StageKind::Classify => RunState::Classifying,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            StageStatus::Success => "success",
            StageStatus::Skipped => "skipped",
            StageStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage: StageKind,
    pub status: StageStatus,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stage-specific statistics.
    pub stats: serde_json::Value,
}

impl StageResult {
    pub fn success(stage: StageKind, stats: impl Serialize) -> Self {
        Self::new(stage, StageStatus::Success, None, stats)
    }

    pub fn skipped(stage: StageKind, reason: impl Into<String>) -> Self {
        Self::new(
            stage,
            StageStatus::Skipped,
            Some(reason.into()),
            serde_json::Value::Null,
        )
    }

    pub fn failed(stage: StageKind, reason: impl Into<String>) -> Self {
        Self::new(
            stage,
            StageStatus::Failed,
            Some(reason.into()),
            serde_json::Value::Null,
        )
    }

    #[must_use]
    pub fn with_stats(mut self, stats: impl Serialize) -> Self {
        self.stats = to_stats(stats);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn new(
        stage: StageKind,
        status: StageStatus,
        message: Option<String>,
        stats: impl Serialize,
    ) -> Self {
        Self {
            stage,
            status,
            at: Utc::now(),
            message,
            stats: to_stats(stats),
        }
    }

    /// `true` when a downstream stage can rely on this stage's output.
    #[must_use]
    pub fn produced_output(&self) -> bool {
        self.status == StageStatus::Success
    }
}

fn to_stats(stats: impl Serialize) -> serde_json::Value {
    serde_json::to_value(stats).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stage statistics could not be serialized");
        serde_json::Value::Null
    })
}

/// One orchestrated execution of the stage chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub trigger: TriggerSource,
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageResult>,
    pub failed_stage: Option<StageKind>,
    pub error: Option<String>,
}

impl PipelineRun {
    #[must_use]
    pub fn new(trigger: TriggerSource) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trigger,
            state: RunState::Pending,
            started_at: None,
            completed_at: None,
            stages: Vec::new(),
            failed_stage: None,
            error: None,
        }
    }

    /// Move to `to` along the success path, or to `Failed` from any
    /// in-progress state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] for any other move.
    pub fn transition(&mut self, to: RunState) -> Result<(), PipelineError> {
        if !self.state.can_move_to(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        if self.state == RunState::Pending {
            self.started_at = Some(Utc::now());
        }
        if to.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.state = to;
        Ok(())
    }

    /// Mark the run failed at `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidTransition`] if the run already finished.
    pub fn fail(&mut self, stage: StageKind, reason: impl Into<String>) -> Result<(), PipelineError> {
        self.transition(RunState::Failed)?;
        self.failed_stage = Some(stage);
        self.error = Some(reason.into());
        Ok(())
    }

    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == kind)
    }

    /// Ledger row for `raw.pipeline_runs`.
    #[must_use]
    pub fn to_record(&self) -> tgwh_db::PipelineRunRecord {
        tgwh_db::PipelineRunRecord {
            run_id: self.run_id,
            trigger_source: self.trigger.as_str().to_string(),
            state: self.state.as_str().to_string(),
            failed_stage: self.failed_stage.map(|s| s.as_str().to_string()),
            error_message: self.error.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            stages: to_stats(&self.stages),
        }
    }
}
