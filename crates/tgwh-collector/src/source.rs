use async_trait::async_trait;
use tgwh_core::ChannelRef;

use crate::error::SourceError;
use crate::types::{ChannelInfo, SourceMedia, SourceMessage};

/// Read access to an external channel source.
///
/// Implementations report rate limiting as [`SourceError::FloodWait`] and
/// leave waiting to the caller.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, SourceError>;

    /// Up to `limit` messages, newest first, strictly older than `offset_id`
    /// when given.
    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        limit: usize,
        offset_id: Option<i64>,
    ) -> Result<Vec<SourceMessage>, SourceError>;

    async fn download_media(&self, media: &SourceMedia) -> Result<Vec<u8>, SourceError>;
}

#[async_trait]
impl<T: ChannelSource + ?Sized> ChannelSource for std::sync::Arc<T> {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, SourceError> {
        (**self).resolve_channel(channel).await
    }

    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        limit: usize,
        offset_id: Option<i64>,
    ) -> Result<Vec<SourceMessage>, SourceError> {
        (**self).fetch_messages(channel, limit, offset_id).await
    }

    async fn download_media(&self, media: &SourceMedia) -> Result<Vec<u8>, SourceError> {
        (**self).download_media(media).await
    }
}
