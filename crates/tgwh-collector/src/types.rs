//! Wire types for the channel-bridge gateway.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Response of `GET /channels/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: String,
}

/// Response of `GET /channels/{name}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagesPage {
    #[serde(default)]
    pub messages: Vec<SourceMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceMessage {
    pub id: i64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub forwards: Option<i64>,
    #[serde(default)]
    pub media: Option<SourceMedia>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceMedia {
    /// `photo`, `document`, `video`, ...
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl SourceMedia {
    #[must_use]
    pub fn is_photo(&self) -> bool {
        self.kind.eq_ignore_ascii_case("photo")
    }
}
