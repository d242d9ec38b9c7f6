//! Date-partitioned landing store for collected posts and their images.
//!
//! Layout under the base path:
//!
//! ```text
//! <base>/raw/telegram_messages/<YYYY-MM-DD>/<channel>.json
//! <base>/raw/telegram_messages/<YYYY-MM-DD>/_manifest.json
//! <base>/raw/images/<channel>/<message_id>.<ext>
//! ```
//!
//! Partitions are replaced wholesale on rewrite and never deleted. Records are
//! validated into [`tgwh_core::Post`] on read; records that fail validation are
//! reported separately instead of failing the partition.

pub mod error;
pub mod record;
pub mod store;

pub use error::LandingError;
pub use record::{LandingRecord, MalformedRecord};
pub use store::{
    LandingPartition, LandingStore, LoadManifest, PartitionContents, PartitionListing,
};
