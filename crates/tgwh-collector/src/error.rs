use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("flood wait requested by source ({seconds}s)")]
    FloodWait { seconds: u64 },

    #[error("gave up after {waits} flood waits")]
    FloodWaitExhausted { waits: u32 },

    #[error("channel {channel} is private")]
    ChannelPrivate { channel: String },

    #[error("channel {channel} does not exist")]
    ChannelNotFound { channel: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid source URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl SourceError {
    /// `true` for errors that mean the channel cannot be read at all.
    #[must_use]
    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            SourceError::ChannelPrivate { .. } | SourceError::ChannelNotFound { .. }
        )
    }
}
