//! External relational-to-dimensional transform, run as a subprocess.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tgwh_core::TransformSettings;

/// Captured result of one transform invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr.
    pub output: String,
}

impl TransformOutput {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("transform program `{program}` is not installed")]
    NotInstalled { program: String },

    #[error("transform project directory {} does not exist", path.display())]
    ProjectMissing { path: PathBuf },

    #[error("transform timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl TransformError {
    /// The transform could not run because something it needs is absent.
    #[must_use]
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            TransformError::NotInstalled { .. } | TransformError::ProjectMissing { .. }
        )
    }
}

#[async_trait]
pub trait Transformer: Send + Sync {
    async fn run(&self, project_dir: &Path) -> Result<TransformOutput, TransformError>;
}

/// Runs `<program> <args...>` (by default `dbt run`) inside the project directory.
#[derive(Debug, Clone)]
pub struct DbtTransformer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl DbtTransformer {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &TransformSettings) -> Self {
        Self::new(
            settings.program.clone(),
            settings.args.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

#[async_trait]
impl Transformer for DbtTransformer {
    async fn run(&self, project_dir: &Path) -> Result<TransformOutput, TransformError> {
        if !project_dir.is_dir() {
            return Err(TransformError::ProjectMissing {
                path: project_dir.to_path_buf(),
            });
        }

        tracing::info!(
            program = %self.program,
            args = ?self.args,
            project_dir = %project_dir.display(),
            "running transform"
        );

        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(project_dir)
            .kill_on_drop(true)
            .output();

        // Dropping the pending future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(TransformError::NotInstalled {
                    program: self.program.clone(),
                });
            }
            Ok(Err(source)) => {
                return Err(TransformError::Spawn {
                    program: self.program.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(TransformError::TimedOut {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(TransformOutput {
            exit_code: output.status.code(),
            output: text,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> DbtTransformer {
        DbtTransformer::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[tokio::test]
    async fn zero_exit_passes_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh("echo models built", Duration::from_secs(10))
            .run(dir.path())
            .await
            .unwrap();
        assert!(out.passed());
        assert!(out.output.contains("models built"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let out = sh("echo broken >&2; exit 3", Duration::from_secs(10))
            .run(dir.path())
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.passed());
        assert!(out.output.contains("broken"));
    }

    #[tokio::test]
    async fn slow_transform_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("sleep 5", Duration::from_millis(100))
            .run(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::TimedOut { .. }));
        assert!(!err.is_missing_input());
    }

    #[tokio::test]
    async fn missing_program_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let err = DbtTransformer::new("tgwh-no-such-binary", vec![], Duration::from_secs(5))
            .run(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::NotInstalled { .. }));
        assert!(err.is_missing_input());
    }

    #[tokio::test]
    async fn missing_project_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("true", Duration::from_secs(5))
            .run(&dir.path().join("medical_warehouse"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::ProjectMissing { .. }));
    }
}
