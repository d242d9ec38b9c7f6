use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tgwh_core::Post;

use crate::error::LandingError;
use crate::record::{LandingRecord, MalformedRecord};

const MESSAGES_DIR: &str = "telegram_messages";
const IMAGES_DIR: &str = "images";
const MANIFEST_FILE: &str = "_manifest.json";

/// One channel's partition for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingPartition {
    pub date: NaiveDate,
    pub channel_name: String,
    pub path: PathBuf,
}

/// Result of [`LandingStore::list_partitions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionListing {
    pub requested: NaiveDate,
    /// Date the partitions belong to, `None` when nothing was found.
    pub date: Option<NaiveDate>,
    pub partitions: Vec<LandingPartition>,
    /// `true` when `date` differs from `requested`.
    pub fell_back: bool,
}

impl PartitionListing {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionContents {
    pub posts: Vec<Post>,
    pub malformed: Vec<MalformedRecord>,
}

/// Written next to a date's partitions once they have been loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadManifest {
    pub date: NaiveDate,
    pub loaded_at: DateTime<Utc>,
    pub partitions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LandingStore {
    base: PathBuf,
}

impl LandingStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    #[must_use]
    pub fn messages_root(&self) -> PathBuf {
        self.base.join("raw").join(MESSAGES_DIR)
    }

    #[must_use]
    pub fn images_root(&self) -> PathBuf {
        self.base.join("raw").join(IMAGES_DIR)
    }

    #[must_use]
    pub fn channel_image_dir(&self, channel: &str) -> PathBuf {
        self.images_root().join(channel)
    }

    #[must_use]
    pub fn image_path(&self, channel: &str, message_id: i64, ext: &str) -> PathBuf {
        self.channel_image_dir(channel)
            .join(format!("{message_id}.{ext}"))
    }

    #[must_use]
    pub fn partition_path(&self, channel: &str, date: NaiveDate) -> PathBuf {
        self.date_dir(date).join(format!("{channel}.json"))
    }

    fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.messages_root().join(date.format("%Y-%m-%d").to_string())
    }

    /// Persist the full post list for `channel` on `date`, replacing any
    /// earlier write for the same key.
    ///
    /// # Errors
    ///
    /// Returns [`LandingError::InvalidChannel`] for names that cannot be used
    /// as a file stem, and I/O or encoding errors otherwise.
    pub fn write(
        &self,
        channel: &str,
        date: NaiveDate,
        posts: &[Post],
    ) -> Result<LandingPartition, LandingError> {
        validate_channel_key(channel)?;
        let path = self.partition_path(channel, date);
        let records: Vec<LandingRecord> = posts.iter().map(LandingRecord::from).collect();
        let bytes = serde_json::to_vec_pretty(&records).map_err(|source| LandingError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)?;

        tracing::debug!(
            channel,
            %date,
            records = records.len(),
            path = %path.display(),
            "landing partition written"
        );

        Ok(LandingPartition {
            date,
            channel_name: channel.to_string(),
            path,
        })
    }

    /// Store image bytes at the conventional blob path and return that path.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid or the file cannot be written.
    pub fn write_image(
        &self,
        channel: &str,
        message_id: i64,
        ext: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, LandingError> {
        validate_channel_key(channel)?;
        let path = self.image_path(channel, message_id, ext);
        write_atomic(&path, bytes)?;
        Ok(path)
    }

    /// List partitions for `date` (default: today in UTC). When that date has
    /// none, falls back to the most recent earlier date that does.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the messages root exists but cannot be read.
    pub fn list_partitions(&self, date: Option<NaiveDate>) -> Result<PartitionListing, LandingError> {
        let requested = date.unwrap_or_else(|| Utc::now().date_naive());

        let partitions = self.partitions_for(requested)?;
        if !partitions.is_empty() {
            return Ok(PartitionListing {
                requested,
                date: Some(requested),
                partitions,
                fell_back: false,
            });
        }

        let mut dates: Vec<NaiveDate> = self
            .available_dates()?
            .into_iter()
            .filter(|d| *d < requested)
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));

        for candidate in dates {
            let partitions = self.partitions_for(candidate)?;
            if !partitions.is_empty() {
                tracing::info!(
                    requested = %requested,
                    fallback = %candidate,
                    "no partitions for requested date, using most recent earlier date"
                );
                return Ok(PartitionListing {
                    requested,
                    date: Some(candidate),
                    partitions,
                    fell_back: true,
                });
            }
        }

        Ok(PartitionListing {
            requested,
            date: None,
            partitions: Vec::new(),
            fell_back: false,
        })
    }

    fn available_dates(&self) -> Result<Vec<NaiveDate>, LandingError> {
        let root = self.messages_root();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LandingError::io(root, e)),
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LandingError::io(&root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, "%Y-%m-%d").ok())
            {
                dates.push(date);
            }
        }
        Ok(dates)
    }

    fn partitions_for(&self, date: NaiveDate) -> Result<Vec<LandingPartition>, LandingError> {
        let dir = self.date_dir(date);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LandingError::io(dir, e)),
        };

        let mut partitions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LandingError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('_') || stem.starts_with('.') {
                continue;
            }
            partitions.push(LandingPartition {
                date,
                channel_name: stem.to_string(),
                path: path.clone(),
            });
        }
        partitions.sort_by(|a, b| a.channel_name.cmp(&b.channel_name));
        Ok(partitions)
    }

    /// Read and validate a partition's records.
    ///
    /// # Errors
    ///
    /// Returns [`LandingError::CorruptPartition`] if the file is not a JSON
    /// array. Individual bad records go to [`PartitionContents::malformed`].
    pub fn read(&self, partition: &LandingPartition) -> Result<PartitionContents, LandingError> {
        let raw = fs::read_to_string(&partition.path)
            .map_err(|e| LandingError::io(&partition.path, e))?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| LandingError::CorruptPartition {
                path: partition.path.clone(),
                reason: e.to_string(),
            })?;
        let serde_json::Value::Array(items) = value else {
            return Err(LandingError::CorruptPartition {
                path: partition.path.clone(),
                reason: "top-level value is not an array".to_string(),
            });
        };

        let mut contents = PartitionContents::default();
        for (index, item) in items.into_iter().enumerate() {
            let message_id = item.get("message_id").and_then(serde_json::Value::as_i64);
            let converted = serde_json::from_value::<LandingRecord>(item)
                .map_err(|e| e.to_string())
                .and_then(Post::try_from);
            match converted {
                Ok(post) => contents.posts.push(post),
                Err(reason) => contents.malformed.push(MalformedRecord {
                    index,
                    message_id,
                    reason,
                }),
            }
        }
        Ok(contents)
    }

    /// Record which partitions of `date` were loaded. Partition files are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be encoded or written.
    pub fn archive(
        &self,
        date: NaiveDate,
        partitions: &[LandingPartition],
        loaded_at: DateTime<Utc>,
    ) -> Result<LoadManifest, LandingError> {
        let manifest = LoadManifest {
            date,
            loaded_at,
            partitions: partitions.iter().map(|p| p.channel_name.clone()).collect(),
        };
        let path = self.date_dir(date).join(MANIFEST_FILE);
        let bytes = serde_json::to_vec_pretty(&manifest).map_err(|source| LandingError::Encode {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)?;
        Ok(manifest)
    }

    /// Returns `Ok(None)` when the date has not been archived.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest exists but cannot be read or parsed.
    pub fn read_manifest(&self, date: NaiveDate) -> Result<Option<LoadManifest>, LandingError> {
        let path = self.date_dir(date).join(MANIFEST_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LandingError::io(path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| LandingError::CorruptPartition {
                path,
                reason: e.to_string(),
            })
    }
}

fn validate_channel_key(channel: &str) -> Result<(), LandingError> {
    if tgwh_core::is_valid_channel_name(channel) {
        Ok(())
    } else {
        Err(LandingError::InvalidChannel(channel.to_string()))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LandingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| LandingError::io(parent, e))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, bytes).map_err(|e| LandingError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| LandingError::io(path, e))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
