use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LandingError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode partition {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("partition {path} is not a JSON array of records: {reason}")]
    CorruptPartition { path: PathBuf, reason: String },

    #[error("channel name \"{0}\" cannot be used as a partition key")]
    InvalidChannel(String),
}

impl LandingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LandingError::Io {
            path: path.into(),
            source,
        }
    }
}
