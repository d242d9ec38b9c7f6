use std::collections::BTreeMap;
use std::path::Path;

use tgwh_core::{Enrichment, ImageCategory};

use crate::detector::ObjectDetector;
use crate::error::ClassifierError;
use crate::taxonomy::classify;

/// A post image waiting for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub message_id: i64,
    pub channel_name: String,
    pub image_path: String,
}

/// An image the detector could not process. The post keeps no enrichment and
/// is picked up again by the next pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyFailure {
    pub message_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifyReport {
    pub enrichments: Vec<Enrichment>,
    pub category_counts: BTreeMap<ImageCategory, usize>,
    pub failures: Vec<ClassifyFailure>,
}

pub struct Classifier<D> {
    detector: D,
    confidence_threshold: f64,
}

impl<D: ObjectDetector> Classifier<D> {
    pub fn new(detector: D, confidence_threshold: f64) -> Self {
        Self {
            detector,
            confidence_threshold,
        }
    }

    /// Detect and classify one image.
    ///
    /// Detections below the confidence threshold are dropped before the
    /// rules are applied.
    ///
    /// # Errors
    ///
    /// Propagates detector failures. A missing image is not a failure.
    pub async fn classify_image(&self, image: &ImageRef) -> Result<Enrichment, ClassifierError> {
        let mut detections = self.detector.detect(Path::new(&image.image_path)).await?;
        detections.retain(|d| d.confidence <= 1.0 && d.confidence >= self.confidence_threshold);

        let classification = classify(&detections);
        Ok(Enrichment {
            message_id: image.message_id,
            channel_name: image.channel_name.clone(),
            image_path: image.image_path.clone(),
            category: classification.category,
            confidence_score: classification.confidence,
            has_person: classification.has_person,
            has_product: classification.has_product,
            detections,
        })
    }

    /// Classify every image, collecting per-image detector failures instead of
    /// stopping.
    pub async fn classify_all(&self, images: &[ImageRef]) -> ClassifyReport {
        let mut report = ClassifyReport::default();

        for (index, image) in images.iter().enumerate() {
            tracing::debug!(
                message_id = image.message_id,
                progress = index + 1,
                total = images.len(),
                "classifying image"
            );
            match self.classify_image(image).await {
                Ok(enrichment) => {
                    *report.category_counts.entry(enrichment.category).or_default() += 1;
                    report.enrichments.push(enrichment);
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = image.message_id,
                        image = %image.image_path,
                        error = %e,
                        "detection failed"
                    );
                    report.failures.push(ClassifyFailure {
                        message_id: image.message_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        for (category, count) in &report.category_counts {
            tracing::info!(category = %category, count, "category summary");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tgwh_core::Detection;

    use super::*;

    /// Returns canned detections keyed by file name; `fail.jpg` errors.
    struct CannedDetector {
        calls: Mutex<Vec<PathBuf>>,
    }

    fn det(class_id: u32, name: &str, confidence: f64) -> Detection {
        Detection {
            class_id,
            class_name: name.to_string(),
            confidence,
            bbox: [0.0, 0.0, 1.0, 1.0],
        }
    }

    #[async_trait]
    impl ObjectDetector for CannedDetector {
        async fn detect(&self, image: &Path) -> Result<Vec<Detection>, ClassifierError> {
            self.calls.lock().unwrap().push(image.to_path_buf());
            let name = image.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            match name {
                "1.jpg" => Ok(vec![det(0, "person", 0.9), det(39, "bottle", 0.5)]),
                "2.jpg" => Ok(vec![det(39, "bottle", 0.8), det(0, "person", 0.1)]),
                "fail.jpg" => Err(ClassifierError::DetectorStatus {
                    status: 503,
                    body: "model loading".to_string(),
                }),
                _ => Ok(Vec::new()),
            }
        }
    }

    fn image(id: i64, file: &str) -> ImageRef {
        ImageRef {
            message_id: id,
            channel_name: "cheMed123".to_string(),
            image_path: format!("data/raw/images/cheMed123/{file}"),
        }
    }

    fn classifier() -> Classifier<CannedDetector> {
        Classifier::new(
            CannedDetector {
                calls: Mutex::new(Vec::new()),
            },
            0.25,
        )
    }

    #[tokio::test]
    async fn low_confidence_detections_are_discarded() {
        let enrichment = classifier().classify_image(&image(2, "2.jpg")).await.unwrap();
        assert_eq!(enrichment.category, ImageCategory::ProductDisplay);
        assert_eq!(enrichment.detection_count(), 1);
        assert!(!enrichment.has_person);
    }

    #[tokio::test]
    async fn missing_image_is_other() {
        let enrichment = classifier()
            .classify_image(&image(3, "missing.jpg"))
            .await
            .unwrap();
        assert_eq!(enrichment.category, ImageCategory::Other);
        assert!(enrichment.confidence_score.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn classify_all_counts_categories_and_keeps_failures() {
        let report = classifier()
            .classify_all(&[image(1, "1.jpg"), image(2, "2.jpg"), image(9, "fail.jpg")])
            .await;

        assert_eq!(report.enrichments.len(), 2);
        assert_eq!(report.category_counts[&ImageCategory::Promotional], 1);
        assert_eq!(report.category_counts[&ImageCategory::ProductDisplay], 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].message_id, 9);
    }

    #[tokio::test]
    async fn classification_is_deterministic() {
        let c = classifier();
        let first = c.classify_all(&[image(1, "1.jpg")]).await;
        let second = c.classify_all(&[image(1, "1.jpg")]).await;
        assert_eq!(first.enrichments, second.enrichments);
        assert_eq!(c.detector.calls.lock().unwrap().len(), 2);
    }
}
