//! Fixed mapping from detector class ids to content categories.

use tgwh_core::{Detection, ImageCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRole {
    Person,
    Product,
}

pub const PERSON_CLASS_ID: u32 = 0;

/// COCO classes the rules look at. Everything else is ignored for the
/// person/product flags but still counts toward the confidence mean.
pub const TAXONOMY: &[(u32, &str, ObjectRole)] = &[
    (PERSON_CLASS_ID, "person", ObjectRole::Person),
    (39, "bottle", ObjectRole::Product),
    (40, "wine glass", ObjectRole::Product),
    (41, "cup", ObjectRole::Product),
    (44, "bowl", ObjectRole::Product),
    (46, "banana", ObjectRole::Product),
    (47, "apple", ObjectRole::Product),
    (48, "sandwich", ObjectRole::Product),
    (49, "orange", ObjectRole::Product),
    (67, "cell phone", ObjectRole::Product),
];

#[must_use]
pub fn role_of(class_id: u32) -> Option<ObjectRole> {
    TAXONOMY
        .iter()
        .find(|(id, _, _)| *id == class_id)
        .map(|(_, _, role)| *role)
}

/// Category and aggregate confidence derived from one image's detections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category: ImageCategory,
    /// Mean of all detection confidences, `0.0` for no detections.
    pub confidence: f64,
    pub has_person: bool,
    pub has_product: bool,
}

#[must_use]
pub fn classify(detections: &[Detection]) -> Classification {
    let has_person = detections
        .iter()
        .any(|d| role_of(d.class_id) == Some(ObjectRole::Person));
    let has_product = detections
        .iter()
        .any(|d| role_of(d.class_id) == Some(ObjectRole::Product));

    let category = match (has_person, has_product) {
        (true, true) => ImageCategory::Promotional,
        (false, true) => ImageCategory::ProductDisplay,
        (true, false) => ImageCategory::Lifestyle,
        (false, false) => ImageCategory::Other,
    };

    let confidence = if detections.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = detections.len() as f64;
        detections.iter().map(|d| d.confidence).sum::<f64>() / n
    };

    Classification {
        category,
        confidence,
        has_person,
        has_product,
    }
}
