//! HTTP client for the channel-bridge gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use tgwh_core::{AppConfig, ChannelRef};

use crate::error::SourceError;
use crate::source::ChannelSource;
use crate::types::{ChannelInfo, MessagesPage, SourceMedia, SourceMessage};

/// Wait applied when a flood-wait response carries no usable `Retry-After`.
pub const DEFAULT_FLOOD_WAIT_SECS: u64 = 60;

/// Telegram-style gateways signal flood waits with 420; plain HTTP proxies use 429.
const ENHANCE_YOUR_CALM: u16 = 420;

/// [`ChannelSource`] backed by the gateway's JSON API.
///
/// Status mapping: 403 is a private channel, 404 a missing one, 420/429 a
/// flood wait. Nothing is retried here; the collector owns the wait loop.
pub struct HttpChannelSource {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpChannelSource {
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidUrl`] if `base_url` does not parse, or
    /// [`SourceError::Http`] if the `reqwest::Client` cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        token: Option<String>,
    ) -> Result<Self, SourceError> {
        // A trailing slash makes `Url::join` append rather than replace the last segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| SourceError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// # Errors
    ///
    /// See [`HttpChannelSource::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SourceError> {
        Self::new(
            &config.source_url,
            config.source_timeout_secs,
            &config.source_user_agent,
            config.source_token.clone(),
        )
    }

    fn channel_url(&self, channel: &ChannelRef, suffix: &str) -> Result<Url, SourceError> {
        let relative = format!("channels/{}{suffix}", channel.name);
        self.base_url
            .join(&relative)
            .map_err(|e| SourceError::InvalidUrl {
                url: relative,
                reason: e.to_string(),
            })
    }

    async fn get(&self, url: Url, channel: Option<&ChannelRef>) -> Result<Response, SourceError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == ENHANCE_YOUR_CALM {
            let seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_FLOOD_WAIT_SECS);
            return Err(SourceError::FloodWait { seconds });
        }

        if let Some(channel) = channel {
            if status == StatusCode::FORBIDDEN {
                return Err(SourceError::ChannelPrivate {
                    channel: channel.handle.clone(),
                });
            }
            if status == StatusCode::NOT_FOUND {
                return Err(SourceError::ChannelNotFound {
                    channel: channel.handle.clone(),
                });
            }
        }

        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChannelSource for HttpChannelSource {
    async fn resolve_channel(&self, channel: &ChannelRef) -> Result<ChannelInfo, SourceError> {
        let url = self.channel_url(channel, "")?;
        let body = self.get(url, Some(channel)).await?.text().await?;
        serde_json::from_str::<ChannelInfo>(&body).map_err(|e| SourceError::Deserialize {
            context: format!("channel info for {channel}"),
            source: e,
        })
    }

    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        limit: usize,
        offset_id: Option<i64>,
    ) -> Result<Vec<SourceMessage>, SourceError> {
        let mut url = self.channel_url(channel, "/messages")?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        if let Some(offset) = offset_id {
            url.query_pairs_mut()
                .append_pair("offset_id", &offset.to_string());
        }

        let body = self.get(url, Some(channel)).await?.text().await?;
        let page = serde_json::from_str::<MessagesPage>(&body).map_err(|e| {
            SourceError::Deserialize {
                context: format!("messages page for {channel}"),
                source: e,
            }
        })?;
        Ok(page.messages)
    }

    async fn download_media(&self, media: &SourceMedia) -> Result<Vec<u8>, SourceError> {
        let Some(raw) = media.url.as_deref() else {
            return Err(SourceError::InvalidUrl {
                url: String::new(),
                reason: format!("{} media has no download url", media.kind),
            });
        };
        // Gateways may hand out relative download paths.
        let url = Url::parse(raw)
            .or_else(|_| self.base_url.join(raw.trim_start_matches('/')))
            .map_err(|e| SourceError::InvalidUrl {
                url: raw.to_owned(),
                reason: e.to_string(),
            })?;
        let bytes = self.get(url, None).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
