//! The four pipeline stages.
//!
//! Each stage takes its collaborators, the run configuration and the upstream
//! stage's result, and returns its own [`StageResult`]. Stage-local problems
//! become `Skipped` or `Failed` results; only errors that must stop the whole
//! run (transform failure, interruption) are returned as `Err`.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tgwh_classifier::{write_detection_csv, Classifier, ObjectDetector};
use tgwh_collector::{ChannelSource, Collector};
use tgwh_core::ImageCategory;
use tgwh_landing::LandingStore;
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::error::PipelineError;
use crate::loader::{load_partitions, LoadOutcome};
use crate::run::{StageKind, StageResult};
use crate::transform::Transformer;
use crate::warehouse::{WarehouseConnector, WarehouseSession};

/// Lines of transform output kept in the stage statistics.
const TRANSFORM_OUTPUT_TAIL: usize = 20;

fn note_upstream(stage: StageKind, upstream: Option<&StageResult>) {
    if let Some(prev) = upstream.filter(|r| !r.produced_output()) {
        tracing::info!(
            stage = %stage,
            upstream = %prev.stage,
            upstream_status = %prev.status,
            "upstream produced no new output, using existing state"
        );
    }
}

/// Collect every configured channel into today's landing partitions.
///
/// # Errors
///
/// Returns [`PipelineError::Interrupted`] when `cancel` fires. Buffered posts
/// of the channel in progress are landed first.
pub async fn collect(
    source: Arc<dyn ChannelSource>,
    config: &RunConfig,
    cancel: &CancellationToken,
) -> Result<StageResult, PipelineError> {
    if config.channels.is_empty() {
        tracing::warn!("no channels configured");
        return Ok(StageResult::skipped(StageKind::Collect, "no channels configured"));
    }

    let date = config.date.unwrap_or_else(|| Utc::now().date_naive());
    let collector = Collector::new(
        source,
        LandingStore::new(&config.base_path),
        config.collector_settings(),
    );

    let outcome = collector.collect(&config.channels, date, cancel).await;
    if outcome.interrupted {
        tracing::warn!(
            messages = outcome.stats.total_messages,
            "collection interrupted, buffered posts were landed"
        );
        return Err(PipelineError::Interrupted);
    }
    Ok(StageResult::success(StageKind::Collect, &outcome.stats))
}

/// Load the landing partitions into the warehouse raw table. Failures become a
/// `Failed` stage result.
pub async fn load(
    connector: &dyn WarehouseConnector,
    config: &RunConfig,
    upstream: Option<&StageResult>,
) -> StageResult {
    note_upstream(StageKind::Load, upstream);

    let session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "warehouse connection failed");
            return StageResult::failed(StageKind::Load, e.to_string());
        }
    };
    let store = LandingStore::new(&config.base_path);
    let outcome = load_partitions(&store, session.as_ref(), config.date).await;
    session.close().await;

    match outcome {
        Ok(LoadOutcome::Loaded(report)) => StageResult::success(StageKind::Load, &report),
        Ok(LoadOutcome::NoPartitions { requested }) => StageResult::skipped(
            StageKind::Load,
            format!("no landing partition found on or before {requested}"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "load failed");
            StageResult::failed(StageKind::Load, e.to_string())
        }
    }
}

#[derive(Serialize)]
struct TransformStats {
    exit_code: Option<i32>,
    output_tail: Vec<String>,
}

fn output_tail(output: &str) -> Vec<String> {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(TRANSFORM_OUTPUT_TAIL);
    lines[start..].iter().map(|l| (*l).to_string()).collect()
}

/// Run the external transform.
///
/// # Errors
///
/// Returns [`PipelineError::TransformFailed`] on a non-zero exit and
/// [`PipelineError::Transform`] on timeout or spawn failure. A missing program
/// or project directory yields a `Skipped` result instead.
pub async fn transform(
    transformer: &dyn Transformer,
    config: &RunConfig,
    upstream: Option<&StageResult>,
) -> Result<StageResult, PipelineError> {
    note_upstream(StageKind::Transform, upstream);

    match transformer.run(&config.transform.project_dir).await {
        Ok(output) if output.passed() => {
            tracing::info!("transform passed");
            Ok(StageResult::success(
                StageKind::Transform,
                TransformStats {
                    exit_code: output.exit_code,
                    output_tail: output_tail(&output.output),
                },
            ))
        }
        Ok(output) => {
            tracing::error!(
                exit_code = ?output.exit_code,
                output = %output.output,
                "transform failed"
            );
            Err(PipelineError::TransformFailed {
                code: output.exit_code,
            })
        }
        Err(e) if e.is_missing_input() => {
            tracing::warn!(error = %e, "skipping transform");
            Ok(StageResult::skipped(StageKind::Transform, e.to_string()))
        }
        Err(e) => {
            tracing::error!(error = %e, "transform failed");
            Err(e.into())
        }
    }
}

#[derive(Debug, Serialize)]
struct ClassifyStats {
    images: usize,
    classified: usize,
    failed: usize,
    /// Enrichments the warehouse refused to store.
    rejected: usize,
    categories: std::collections::BTreeMap<ImageCategory, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    export_path: Option<String>,
}

/// Classify post images that lack an enrichment (all of them with `rescan`).
pub async fn classify(
    detector: Arc<dyn ObjectDetector>,
    connector: &dyn WarehouseConnector,
    config: &RunConfig,
    upstream: Option<&StageResult>,
) -> StageResult {
    note_upstream(StageKind::Classify, upstream);

    let images_root = LandingStore::new(&config.base_path).images_root();
    if !images_root.is_dir() {
        tracing::warn!(path = %images_root.display(), "image directory not found");
        return StageResult::skipped(
            StageKind::Classify,
            format!("image directory {} not found", images_root.display()),
        );
    }

    let session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "warehouse connection failed");
            return StageResult::failed(StageKind::Classify, e.to_string());
        }
    };
    let outcome = classify_pending(detector, session.as_ref(), config).await;
    session.close().await;

    match outcome {
        Ok(stats) => StageResult::success(StageKind::Classify, &stats),
        Err(e) => {
            tracing::error!(error = %e, "classification failed");
            StageResult::failed(StageKind::Classify, e.to_string())
        }
    }
}

async fn classify_pending(
    detector: Arc<dyn ObjectDetector>,
    session: &dyn WarehouseSession,
    config: &RunConfig,
) -> Result<ClassifyStats, PipelineError> {
    let images = session.pending_images(config.rescan).await?;
    tracing::info!(images = images.len(), rescan = config.rescan, "classifying images");

    let classifier = Classifier::new(detector, config.confidence_threshold);
    let report = classifier.classify_all(&images).await;

    let mut categories = report.category_counts;
    let mut stored = Vec::with_capacity(report.enrichments.len());
    let mut rejected = 0usize;
    for enrichment in report.enrichments {
        match session.upsert_enrichment(&enrichment).await {
            Ok(()) => stored.push(enrichment),
            Err(e) => {
                tracing::warn!(
                    message_id = enrichment.message_id,
                    error = %e,
                    "failed to store enrichment"
                );
                if let Some(count) = categories.get_mut(&enrichment.category) {
                    *count = count.saturating_sub(1);
                }
                rejected += 1;
            }
        }
    }
    categories.retain(|_, count| *count > 0);

    let export_path = if stored.is_empty() {
        None
    } else {
        let path = config.detection_export_path();
        write_detection_csv(&path, &stored)?;
        tracing::info!(path = %path.display(), rows = stored.len(), "detection export written");
        Some(path.display().to_string())
    };

    Ok(ClassifyStats {
        images: images.len(),
        classified: stored.len(),
        failed: report.failures.len(),
        rejected,
        categories,
        export_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_tail_keeps_last_lines() {
        let output: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let tail = output_tail(&output);
        assert_eq!(tail.len(), TRANSFORM_OUTPUT_TAIL);
        assert_eq!(tail[0], "line 11");
        assert_eq!(tail.last().map(String::as_str), Some("line 30"));
    }

    #[test]
    fn output_tail_of_short_output_is_everything() {
        assert_eq!(output_tail("ok\n"), vec!["ok".to_string()]);
        assert!(output_tail("").is_empty());
    }
}
