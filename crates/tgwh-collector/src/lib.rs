//! Channel collection: source access, flood-wait handling and landing writes.

pub mod client;
pub mod collector;
pub mod error;
mod flood_wait;
pub mod source;
pub mod stats;
pub mod types;

pub use client::{HttpChannelSource, DEFAULT_FLOOD_WAIT_SECS};
pub use collector::{CollectOutcome, Collector, CollectorSettings};
pub use error::SourceError;
pub use source::ChannelSource;
pub use stats::{ChannelError, ChannelErrorKind, ChannelSummary, CollectStats, FloodWaitEvent};
pub use types::{ChannelInfo, MessagesPage, SourceMedia, SourceMessage};
