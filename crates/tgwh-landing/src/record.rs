//! On-disk record shape for landing partitions and its conversion to [`Post`].

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tgwh_core::Post;

/// One post as stored in a landing partition file.
///
/// `message_date` is kept as text so a bad timestamp in one record can be
/// reported without rejecting the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingRecord {
    pub message_id: i64,
    pub channel_name: String,
    pub channel_title: String,
    pub message_date: Option<String>,
    #[serde(default)]
    pub message_text: Option<String>,
    pub has_media: bool,
    pub image_path: Option<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub forwards: i64,
}

/// A record that could not be turned into a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Position in the partition file.
    pub index: usize,
    pub message_id: Option<i64>,
    pub reason: String,
}

impl From<&Post> for LandingRecord {
    fn from(post: &Post) -> Self {
        LandingRecord {
            message_id: post.message_id,
            channel_name: post.channel_name.clone(),
            channel_title: post.channel_title.clone(),
            message_date: post
                .message_date
                .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            message_text: Some(post.message_text.clone().unwrap_or_default()),
            has_media: post.has_media,
            image_path: post.image_path.clone(),
            views: post.views,
            forwards: post.forwards,
        }
    }
}

impl TryFrom<LandingRecord> for Post {
    type Error = String;

    fn try_from(record: LandingRecord) -> Result<Self, Self::Error> {
        let message_date = match record.message_date.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(parse_timestamp(raw)?),
        };

        if record.views < 0 || record.forwards < 0 {
            return Err(format!(
                "negative counters (views={}, forwards={})",
                record.views, record.forwards
            ));
        }

        if record.channel_name.trim().is_empty() {
            return Err("empty channel_name".to_string());
        }

        let text_fields = [
            ("channel_name", Some(&record.channel_name)),
            ("channel_title", Some(&record.channel_title)),
            ("message_text", record.message_text.as_ref()),
            ("image_path", record.image_path.as_ref()),
        ];
        if let Some((field, _)) = text_fields
            .iter()
            .find(|(_, value)| value.is_some_and(|v| v.contains('\0')))
        {
            return Err(format!("{field} contains a NUL character"));
        }

        let post = Post {
            message_id: record.message_id,
            channel_name: record.channel_name,
            channel_title: record.channel_title,
            message_date,
            message_text: record.message_text.filter(|t| !t.is_empty()),
            has_media: record.has_media,
            image_path: record.image_path.filter(|p| !p.is_empty()),
            views: record.views,
            forwards: record.forwards,
        };

        if !post.media_invariant_holds() {
            return Err("image_path is set but has_media is false".to_string());
        }

        Ok(post)
    }
}

/// Parses RFC 3339 timestamps, falling back to offset-less ISO-8601 read as UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("unparseable message_date \"{raw}\""))
}
