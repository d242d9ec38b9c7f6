use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tgwh_core::{AppConfig, Detection};

use crate::error::ClassifierError;

/// Runs object detection over one image.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Missing or unreadable images, and images the detector cannot decode,
    /// yield an empty list, not an error.
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>, ClassifierError>;
}

#[async_trait]
impl<T: ObjectDetector + ?Sized> ObjectDetector for std::sync::Arc<T> {
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>, ClassifierError> {
        (**self).detect(image).await
    }
}

/// Client for an HTTP inference endpoint (`POST {url}/detect?conf=<threshold>`).
pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
    confidence_threshold: f64,
}

impl HttpDetector {
    /// # Errors
    ///
    /// Returns [`ClassifierError::Http`] if the client cannot be constructed.
    pub fn new(
        detector_url: &str,
        timeout_secs: u64,
        confidence_threshold: f64,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/detect", detector_url.trim_end_matches('/')),
            confidence_threshold,
        })
    }

    /// # Errors
    ///
    /// See [`HttpDetector::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ClassifierError> {
        Self::new(
            &config.detector_url,
            config.detector_timeout_secs,
            config.confidence_threshold,
        )
    }
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>, ClassifierError> {
        let bytes = match tokio::fs::read(image).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                tracing::warn!(image = %image.display(), "image file is empty, treating as no detections");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!(image = %image.display(), error = %e, "image unreadable, treating as no detections");
                return Ok(Vec::new());
            }
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("conf", self.confidence_threshold.to_string())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                image = %image.display(),
                status = status.as_u16(),
                body = %body,
                "detector rejected image, treating as no detections"
            );
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::DetectorStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let mut detections =
            serde_json::from_str::<Vec<Detection>>(&body).map_err(|e| ClassifierError::Json {
                context: format!("detections for {}", image.display()),
                source: e,
            })?;

        let before = detections.len();
        detections.retain(|d| (0.0..=1.0).contains(&d.confidence));
        if detections.len() < before {
            tracing::warn!(
                image = %image.display(),
                dropped = before - detections.len(),
                "detector returned confidences outside [0, 1], dropping them"
            );
        }
        Ok(detections)
    }
}
