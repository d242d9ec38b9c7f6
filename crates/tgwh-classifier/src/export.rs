//! Tabular detection export.

use std::path::Path;

use serde::Serialize;
use tgwh_core::Enrichment;

use crate::error::ClassifierError;

#[derive(Serialize)]
struct ExportRow<'a> {
    message_id: i64,
    channel_name: &'a str,
    image_path: &'a str,
    detection_count: usize,
    image_category: &'static str,
    confidence_score: f64,
    has_person: bool,
    has_product: bool,
    detected_objects: String,
    detections_json: String,
}

/// Write `enrichments` as CSV to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ClassifierError::Io`] if the parent directory cannot be created
/// and [`ClassifierError::Export`] if writing fails.
pub fn write_detection_csv(path: &Path, enrichments: &[Enrichment]) -> Result<(), ClassifierError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ClassifierError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let export_err = |source: csv::Error| ClassifierError::Export {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(export_err)?;
    for enrichment in enrichments {
        let detections_json =
            serde_json::to_string(&enrichment.detections).map_err(|source| ClassifierError::Json {
                context: format!("detections of message {}", enrichment.message_id),
                source,
            })?;
        writer
            .serialize(ExportRow {
                message_id: enrichment.message_id,
                channel_name: &enrichment.channel_name,
                image_path: &enrichment.image_path,
                detection_count: enrichment.detection_count(),
                image_category: enrichment.category.as_str(),
                confidence_score: enrichment.confidence_score,
                has_person: enrichment.has_person,
                has_product: enrichment.has_product,
                detected_objects: enrichment.detected_objects().join(","),
                detections_json,
            })
            .map_err(export_err)?;
    }
    writer.flush().map_err(|source| ClassifierError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use tgwh_core::{Detection, ImageCategory};

    use super::*;

    fn enrichment() -> Enrichment {
        Enrichment {
            message_id: 97,
            channel_name: "lobelia4cosmetics".to_string(),
            image_path: "data/raw/images/lobelia4cosmetics/97.jpg".to_string(),
            category: ImageCategory::Promotional,
            confidence_score: 0.75,
            has_person: true,
            has_product: true,
            detections: vec![
                Detection {
                    class_id: 0,
                    class_name: "person".to_string(),
                    confidence: 0.9,
                    bbox: [1.0, 2.0, 3.0, 4.0],
                },
                Detection {
                    class_id: 39,
                    class_name: "bottle".to_string(),
                    confidence: 0.6,
                    bbox: [5.0, 6.0, 7.0, 8.0],
                },
            ],
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("image_detections.csv");

        write_detection_csv(&path, &[enrichment()]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec![
                "message_id",
                "channel_name",
                "image_path",
                "detection_count",
                "image_category",
                "confidence_score",
                "has_person",
                "has_product",
                "detected_objects",
                "detections_json",
            ]
        );

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "97");
        assert_eq!(&rows[0][3], "2");
        assert_eq!(&rows[0][4], "promotional");
        assert_eq!(&rows[0][8], "person,bottle");

        let detections: Vec<Detection> = serde_json::from_str(&rows[0][9]).unwrap();
        assert_eq!(detections, enrichment().detections);
    }
}
