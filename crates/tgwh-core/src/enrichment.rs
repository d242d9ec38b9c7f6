use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Content category derived from the objects detected in a post's image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCategory {
    Promotional,
    ProductDisplay,
    Lifestyle,
    Other,
}

impl ImageCategory {
    pub const ALL: [ImageCategory; 4] = [
        ImageCategory::Promotional,
        ImageCategory::ProductDisplay,
        ImageCategory::Lifestyle,
        ImageCategory::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ImageCategory::Promotional => "promotional",
            ImageCategory::ProductDisplay => "product_display",
            ImageCategory::Lifestyle => "lifestyle",
            ImageCategory::Other => "other",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for ImageCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// One object found in an image by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` in image pixels.
    pub bbox: [f64; 4],
}

/// Per-post classification record written to the warehouse enrichment table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub message_id: i64,
    pub channel_name: String,
    pub image_path: String,
    pub category: ImageCategory,
    /// Mean confidence over all detections; `0.0` when there are none.
    pub confidence_score: f64,
    pub has_person: bool,
    pub has_product: bool,
    pub detections: Vec<Detection>,
}

impl Enrichment {
    #[must_use]
    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }

    /// Class names in detection order, as written to the `detected_objects` column.
    #[must_use]
    pub fn detected_objects(&self) -> Vec<&str> {
        self.detections
            .iter()
            .map(|d| d.class_name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in ImageCategory::ALL {
            assert_eq!(category.as_str().parse::<ImageCategory>(), Ok(category));
        }
    }

    #[test]
    fn category_display_honours_width() {
        assert_eq!(format!("{:<18}|", ImageCategory::Lifestyle), "lifestyle         |");
        assert_eq!(format!("{:>7}", ImageCategory::Other), "  other");
    }

    #[test]
    fn category_parse_rejects_unknown() {
        let err = "selfie".parse::<ImageCategory>().unwrap_err();
        assert_eq!(err.to_string(), "unknown image category: selfie");
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&ImageCategory::ProductDisplay).unwrap();
        assert_eq!(json, "\"product_display\"");
    }

    #[test]
    fn detected_objects_keeps_detection_order() {
        let enrichment = Enrichment {
            message_id: 1,
            channel_name: "tikvahpharma".to_string(),
            image_path: "data/raw/images/tikvahpharma/1.jpg".to_string(),
            category: ImageCategory::Promotional,
            confidence_score: 0.7,
            has_person: true,
            has_product: true,
            detections: vec![
                Detection {
                    class_id: 39,
                    class_name: "bottle".to_string(),
                    confidence: 0.6,
                    bbox: [0.0, 0.0, 10.0, 10.0],
                },
                Detection {
                    class_id: 0,
                    class_name: "person".to_string(),
                    confidence: 0.8,
                    bbox: [5.0, 5.0, 50.0, 90.0],
                },
            ],
        };
        assert_eq!(enrichment.detection_count(), 2);
        assert_eq!(enrichment.detected_objects(), vec!["bottle", "person"]);
    }
}
