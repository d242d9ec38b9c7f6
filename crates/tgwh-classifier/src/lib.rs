//! Image enrichment: object detection plus a fixed category rule table.

pub mod classifier;
pub mod detector;
pub mod error;
pub mod export;
pub mod taxonomy;

pub use classifier::{Classifier, ClassifyFailure, ClassifyReport, ImageRef};
pub use detector::{HttpDetector, ObjectDetector};
pub use error::ClassifierError;
pub use export::write_detection_csv;
pub use taxonomy::{classify, role_of, Classification, ObjectRole, PERSON_CLASS_ID, TAXONOMY};

/// File name of the detection export under `<base>/processed/`.
pub const DETECTION_EXPORT_FILE: &str = "image_detections.csv";
