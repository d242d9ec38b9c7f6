//! Pipeline orchestration: the stage chain, run state and its entry points.
//!
//! A run executes `collect -> load -> transform -> classify` strictly in
//! order. Stage-local problems are reported as skipped or failed stage
//! results; a transform failure or a user interrupt fails the whole run.

pub mod config;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod run;
pub mod schedule;
pub mod stages;
pub mod transform;
pub mod warehouse;

pub use config::RunConfig;
pub use error::PipelineError;
pub use loader::{load_partitions, LoadOutcome, LoadReport};
pub use orchestrator::Orchestrator;
pub use run::{PipelineRun, RunState, StageKind, StageResult, StageStatus, TriggerSource};
pub use schedule::{build_scheduler, manual_trigger};
pub use transform::{DbtTransformer, TransformError, TransformOutput, Transformer};
pub use warehouse::{PgWarehouse, WarehouseConnector, WarehouseSession};
