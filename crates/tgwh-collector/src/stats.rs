use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorKind {
    InvalidChannel,
    ChannelPrivate,
    ChannelNotFound,
    Network,
    FloodWaitExhausted,
    Landing,
}

impl fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelErrorKind::InvalidChannel => "invalid_channel",
            ChannelErrorKind::ChannelPrivate => "channel_private",
            ChannelErrorKind::ChannelNotFound => "channel_not_found",
            ChannelErrorKind::Network => "network",
            ChannelErrorKind::FloodWaitExhausted => "flood_wait_exhausted",
            ChannelErrorKind::Landing => "landing",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelError {
    pub channel: String,
    pub kind: ChannelErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub date: NaiveDate,
    pub message_count: usize,
    pub image_count: usize,
    pub partition_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FloodWaitEvent {
    pub channel: String,
    pub seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    pub channels_scraped: Vec<ChannelSummary>,
    pub total_messages: usize,
    pub total_images: usize,
    pub flood_waits: Vec<FloodWaitEvent>,
    pub errors: Vec<ChannelError>,
}

impl CollectStats {
    pub(crate) fn record_error(
        &mut self,
        channel: &str,
        kind: ChannelErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(ChannelError {
            channel: channel.to_string(),
            kind,
            message: message.into(),
            wait_seconds: None,
        });
    }
}
