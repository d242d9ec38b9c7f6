//! Shared domain types and configuration for the channel ingestion warehouse.

mod app_config;
mod channels;
mod config;
mod enrichment;
mod post;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, ScheduleSettings, TransformSettings};
pub use channels::{is_valid_channel_name, load_channels, normalize_channel, ChannelRef, ChannelsFile};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use enrichment::{Detection, Enrichment, ImageCategory, ParseCategoryError};
pub use post::Post;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read channels file {path}: {source}")]
    ChannelsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse channels file: {0}")]
    ChannelsFileParse(#[from] serde_yaml::Error),

    #[error("invalid channel \"{raw}\": {reason}")]
    InvalidChannel { raw: String, reason: String },

    #[error("channels validation failed: {0}")]
    Validation(String),
}
