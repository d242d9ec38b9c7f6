use thiserror::Error;

use crate::run::RunState;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("warehouse error: {0}")]
    Warehouse(#[from] tgwh_db::DbError),

    #[error("landing store error: {0}")]
    Landing(#[from] tgwh_landing::LandingError),

    #[error("classifier error: {0}")]
    Classifier(#[from] tgwh_classifier::ClassifierError),

    #[error(transparent)]
    Transform(#[from] crate::transform::TransformError),

    #[error("transform exited with status {code:?}")]
    TransformFailed { code: Option<i32> },

    #[error("run interrupted")]
    Interrupted,

    #[error("scheduler error: {0}")]
    Schedule(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("invalid run state transition {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },
}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::Warehouse(tgwh_db::DbError::Sqlx(e))
    }
}

impl From<sqlx::migrate::MigrateError> for PipelineError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        PipelineError::Warehouse(tgwh_db::DbError::Migration(e))
    }
}
