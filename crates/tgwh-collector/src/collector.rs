use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use tgwh_core::{normalize_channel, AppConfig, ChannelRef, Post};
use tgwh_landing::LandingStore;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::flood_wait::{pause, with_flood_wait, Attempt, FloodWaitBudget};
use crate::source::ChannelSource;
use crate::stats::{ChannelErrorKind, ChannelSummary, CollectStats, FloodWaitEvent};
use crate::types::SourceMessage;

/// Largest page requested from the source in one call.
const PAGE_SIZE: usize = 100;
const PROGRESS_EVERY: usize = 50;
const PHOTO_EXT: &str = "jpg";

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub message_limit: usize,
    pub message_delay: Duration,
    pub channel_delay: Duration,
    pub max_flood_waits: u32,
    pub max_flood_wait_secs: u64,
}

impl CollectorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            message_limit: config.message_limit,
            message_delay: Duration::from_millis(config.message_delay_ms),
            channel_delay: Duration::from_millis(config.channel_delay_ms),
            max_flood_waits: config.max_flood_waits,
            max_flood_wait_secs: config.max_flood_wait_secs,
        }
    }
}

/// Result of [`Collector::collect`].
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    /// Posts obtained per channel name. Inaccessible channels map to an empty list.
    pub posts: BTreeMap<String, Vec<Post>>,
    pub stats: CollectStats,
    /// Set when the run stopped early on cancellation.
    pub interrupted: bool,
}

enum ChannelEnd {
    Finished,
    Interrupted,
}

pub struct Collector<S> {
    source: S,
    store: LandingStore,
    settings: CollectorSettings,
}

impl<S: ChannelSource> Collector<S> {
    pub fn new(source: S, store: LandingStore, settings: CollectorSettings) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    /// Collect every channel in order and land one partition per reachable
    /// channel under `date`.
    ///
    /// Channel-level failures, including a partition that cannot be written,
    /// are recorded in the returned stats and never stop the remaining
    /// channels. On cancellation, posts already buffered for the current
    /// channel are still written.
    pub async fn collect(
        &self,
        channels: &[String],
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> CollectOutcome {
        let mut outcome = CollectOutcome::default();

        for (index, raw) in channels.iter().enumerate() {
            if index > 0 && !pause(self.settings.channel_delay, cancel).await {
                outcome.interrupted = true;
                break;
            }

            let channel = match normalize_channel(raw) {
                Ok(channel) => channel,
                Err(e) => {
                    tracing::error!(channel = %raw, error = %e, "skipping invalid channel");
                    outcome.stats.record_error(
                        raw.trim(),
                        ChannelErrorKind::InvalidChannel,
                        e.to_string(),
                    );
                    continue;
                }
            };

            let end = self
                .collect_channel(&channel, date, cancel, &mut outcome)
                .await;
            if matches!(end, ChannelEnd::Interrupted) {
                outcome.interrupted = true;
                break;
            }
        }

        let stats = &outcome.stats;
        tracing::info!(
            channels = stats.channels_scraped.len(),
            messages = stats.total_messages,
            images = stats.total_images,
            flood_waits = stats.flood_waits.len(),
            errors = stats.errors.len(),
            interrupted = outcome.interrupted,
            "collection finished"
        );
        for error in &stats.errors {
            tracing::warn!(channel = %error.channel, kind = %error.kind, message = %error.message, "channel error");
        }

        outcome
    }

    async fn collect_channel(
        &self,
        channel: &ChannelRef,
        date: NaiveDate,
        cancel: &CancellationToken,
        outcome: &mut CollectOutcome,
    ) -> ChannelEnd {
        let name = channel.name.as_str();
        let mut budget =
            FloodWaitBudget::new(self.settings.max_flood_waits, self.settings.max_flood_wait_secs);
        outcome.posts.insert(name.to_string(), Vec::new());

        tracing::info!(channel = %channel, limit = self.settings.message_limit, "collecting channel");

        let resolved = with_flood_wait(&mut budget, cancel, name, || {
            self.source.resolve_channel(channel)
        })
        .await;
        let info = match resolved {
            Ok(Attempt::Done(info)) => info,
            Ok(Attempt::Cancelled) => {
                record_waits(&mut outcome.stats, name, &budget);
                return ChannelEnd::Interrupted;
            }
            Err(e) => {
                record_waits(&mut outcome.stats, name, &budget);
                record_source_error(&mut outcome.stats, name, &e, &budget);
                return ChannelEnd::Finished;
            }
        };

        let mut buffer: Vec<Post> = Vec::new();
        let mut image_count = 0usize;
        let mut offset_id: Option<i64> = None;
        let mut end = ChannelEnd::Finished;

        'pages: while buffer.len() < self.settings.message_limit {
            let page_size = (self.settings.message_limit - buffer.len()).min(PAGE_SIZE);
            let fetched = with_flood_wait(&mut budget, cancel, name, || {
                self.source.fetch_messages(channel, page_size, offset_id)
            })
            .await;

            let messages = match fetched {
                Ok(Attempt::Done(messages)) => messages,
                Ok(Attempt::Cancelled) => {
                    end = ChannelEnd::Interrupted;
                    break;
                }
                Err(e) => {
                    record_source_error(&mut outcome.stats, name, &e, &budget);
                    break;
                }
            };
            if messages.is_empty() {
                break;
            }

            for message in messages {
                offset_id = Some(message.id);
                let (post, interrupted) = self
                    .build_post(channel, &info.title, &message, &mut budget, cancel)
                    .await;
                if post.image_path.is_some() {
                    image_count += 1;
                }
                buffer.push(post);

                if buffer.len() % PROGRESS_EVERY == 0 {
                    tracing::info!(channel = %channel, collected = buffer.len(), "progress");
                }

                if interrupted || !pause(self.settings.message_delay, cancel).await {
                    end = ChannelEnd::Interrupted;
                    break 'pages;
                }
                if buffer.len() >= self.settings.message_limit {
                    break 'pages;
                }
            }
        }

        record_waits(&mut outcome.stats, name, &budget);

        let partition = match self.store.write(name, date, &buffer) {
            Ok(partition) => partition,
            Err(e) => {
                tracing::error!(
                    channel = %channel,
                    messages = buffer.len(),
                    error = %e,
                    "failed to land partition, skipping channel"
                );
                outcome
                    .stats
                    .record_error(name, ChannelErrorKind::Landing, e.to_string());
                return end;
            }
        };

        tracing::info!(
            channel = %channel,
            messages = buffer.len(),
            images = image_count,
            path = %partition.path.display(),
            "channel landed"
        );

        outcome.stats.total_messages += buffer.len();
        outcome.stats.total_images += image_count;
        outcome.stats.channels_scraped.push(ChannelSummary {
            channel: name.to_string(),
            date,
            message_count: buffer.len(),
            image_count,
            partition_path: partition.path.display().to_string(),
        });
        outcome.posts.insert(name.to_string(), buffer);

        end
    }

    /// Normalize one source message. Returns `true` alongside the post when
    /// cancellation fired during the image download.
    async fn build_post(
        &self,
        channel: &ChannelRef,
        title: &str,
        message: &SourceMessage,
        budget: &mut FloodWaitBudget,
        cancel: &CancellationToken,
    ) -> (Post, bool) {
        let mut post = Post {
            message_id: message.id,
            channel_name: channel.name.clone(),
            channel_title: title.to_string(),
            message_date: message.date,
            message_text: message.text.clone().filter(|t| !t.is_empty()),
            has_media: message.media.is_some(),
            image_path: None,
            views: message.views.unwrap_or(0).max(0),
            forwards: message.forwards.unwrap_or(0).max(0),
        };

        let Some(media) = message.media.as_ref().filter(|m| m.is_photo()) else {
            return (post, false);
        };

        let downloaded = with_flood_wait(budget, cancel, &channel.name, || {
            self.source.download_media(media)
        })
        .await;
        let bytes = match downloaded {
            Ok(Attempt::Done(bytes)) => bytes,
            Ok(Attempt::Cancelled) => return (post, true),
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    message_id = message.id,
                    error = %e,
                    "image download failed, keeping post without image"
                );
                post.clear_image();
                return (post, false);
            }
        };

        match self
            .store
            .write_image(&channel.name, message.id, PHOTO_EXT, &bytes)
        {
            Ok(path) => post.image_path = Some(path.display().to_string()),
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    message_id = message.id,
                    error = %e,
                    "failed to store image, keeping post without image"
                );
                post.clear_image();
            }
        }
        (post, false)
    }
}

fn record_waits(stats: &mut CollectStats, channel: &str, budget: &FloodWaitBudget) {
    stats
        .flood_waits
        .extend(budget.waits.iter().map(|&seconds| FloodWaitEvent {
            channel: channel.to_string(),
            seconds,
        }));
}

fn record_source_error(
    stats: &mut CollectStats,
    channel: &str,
    error: &SourceError,
    budget: &FloodWaitBudget,
) {
    let kind = match error {
        SourceError::ChannelPrivate { .. } => ChannelErrorKind::ChannelPrivate,
        SourceError::ChannelNotFound { .. } => ChannelErrorKind::ChannelNotFound,
        SourceError::FloodWaitExhausted { .. } => ChannelErrorKind::FloodWaitExhausted,
        _ => ChannelErrorKind::Network,
    };
    if error.is_access_error() {
        tracing::error!(channel, error = %error, "channel is not accessible");
    } else {
        tracing::error!(channel, error = %error, "abandoning channel for this run");
    }
    stats.record_error(channel, kind, error.to_string());
    if kind == ChannelErrorKind::FloodWaitExhausted {
        if let Some(last) = stats.errors.last_mut() {
            last.wait_seconds = budget.waits.last().copied();
        }
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod tests;
