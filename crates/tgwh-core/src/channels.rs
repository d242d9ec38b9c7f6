use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::ConfigError;

/// A normalized channel identifier.
///
/// `handle` is the `@`-prefixed form sent to the source; `name` is the bare
/// form used for landing partition and image blob keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    pub handle: String,
    pub name: String,
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.handle)
    }
}

fn channel_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_]{0,63}$").expect("static regex is valid")
    })
}

/// `true` when `name` can be used as a bare channel name, and therefore as a
/// landing partition key. Names starting with `_` are reserved for landing
/// metadata files.
#[must_use]
pub fn is_valid_channel_name(name: &str) -> bool {
    channel_name_pattern().is_match(name)
}

/// Normalize a user-supplied channel identifier.
///
/// Accepts `@name`, `name`, `https://t.me/name` and `t.me/name`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidChannel`] when the remaining name is empty,
/// starts with `_`, or contains characters outside `[A-Za-z0-9_]`.
pub fn normalize_channel(raw: &str) -> Result<ChannelRef, ConfigError> {
    let trimmed = raw.trim();
    let without_url = ["https://t.me/", "http://t.me/", "t.me/"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    let name = without_url
        .trim_end_matches('/')
        .trim_start_matches('@')
        .to_string();

    if !is_valid_channel_name(&name) {
        return Err(ConfigError::InvalidChannel {
            raw: raw.to_string(),
            reason: "channel name must be 1-64 characters of [A-Za-z0-9_] not starting with _"
                .to_string(),
        });
    }

    Ok(ChannelRef {
        handle: format!("@{name}"),
        name,
    })
}

#[derive(Debug, Deserialize)]
pub struct ChannelsFile {
    pub channels: Vec<String>,
}

/// Load and validate the channel list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, is empty,
/// contains a malformed identifier, or names the same channel twice.
pub fn load_channels(path: &Path) -> Result<Vec<ChannelRef>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ChannelsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ChannelsFile = serde_yaml::from_str(&content)?;
    validate_channels(&file.channels)
}

fn validate_channels(raw: &[String]) -> Result<Vec<ChannelRef>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::Validation(
            "at least one channel must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut channels = Vec::with_capacity(raw.len());
    for entry in raw {
        let channel = normalize_channel(entry)?;
        if !seen.insert(channel.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate channel: '{}'",
                channel.name
            )));
        }
        channels.push(channel);
    }
    Ok(channels)
}

#[cfg(test)]
#[path = "channels_test.rs"]
mod tests;
