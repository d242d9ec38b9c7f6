use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use tgwh_collector::CollectorSettings;
use tgwh_core::{AppConfig, ChannelRef, TransformSettings};

/// Everything one pipeline run needs, passed explicitly to each stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Channel identifiers as configured (`@name`, `name` or t.me URLs).
    pub channels: Vec<String>,
    pub limit: usize,
    pub base_path: PathBuf,
    pub confidence_threshold: f64,
    pub message_delay_ms: u64,
    pub channel_delay_ms: u64,
    pub max_flood_waits: u32,
    pub max_flood_wait_secs: u64,
    pub transform: TransformSettings,
    /// Re-classify images that already have an enrichment.
    pub rescan: bool,
    /// Partition date for collection and loading; today (UTC) when unset.
    pub date: Option<NaiveDate>,
}

impl RunConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig, channels: &[ChannelRef]) -> Self {
        Self {
            channels: channels.iter().map(|c| c.handle.clone()).collect(),
            limit: config.message_limit,
            base_path: config.base_path.clone(),
            confidence_threshold: config.confidence_threshold,
            message_delay_ms: config.message_delay_ms,
            channel_delay_ms: config.channel_delay_ms,
            max_flood_waits: config.max_flood_waits,
            max_flood_wait_secs: config.max_flood_wait_secs,
            transform: config.transform.clone(),
            rescan: false,
            date: None,
        }
    }

    #[must_use]
    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            message_limit: self.limit,
            message_delay: Duration::from_millis(self.message_delay_ms),
            channel_delay: Duration::from_millis(self.channel_delay_ms),
            max_flood_waits: self.max_flood_waits,
            max_flood_wait_secs: self.max_flood_wait_secs,
        }
    }

    #[must_use]
    pub fn detection_export_path(&self) -> PathBuf {
        self.base_path
            .join("processed")
            .join(tgwh_classifier::DETECTION_EXPORT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn app_config(extra: &[(&str, &str)]) -> AppConfig {
        let mut env: HashMap<&str, &str> =
            HashMap::from([("DATABASE_URL", "postgres://localhost/warehouse")]);
        env.extend(extra.iter().copied());
        tgwh_core::build_app_config(|key| {
            env.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        })
        .unwrap()
    }

    #[test]
    fn defaults_follow_app_config() {
        let channels = vec![tgwh_core::normalize_channel("https://t.me/tikvahpharma").unwrap()];
        let config = RunConfig::from_app_config(&app_config(&[]), &channels);

        assert_eq!(config.channels, vec!["@tikvahpharma".to_string()]);
        assert_eq!(config.limit, 1000);
        assert_eq!(config.base_path, PathBuf::from("data"));
        assert!((config.confidence_threshold - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.message_delay_ms, 1000);
        assert_eq!(config.channel_delay_ms, 3000);
        assert_eq!(config.transform.timeout_secs, 600);
        assert!(!config.rescan);
        assert!(config.date.is_none());
    }

    #[test]
    fn collector_settings_convert_delays() {
        let config = RunConfig::from_app_config(
            &app_config(&[("TGWH_MESSAGE_DELAY_MS", "250"), ("TGWH_MAX_FLOOD_WAITS", "2")]),
            &[],
        );
        let settings = config.collector_settings();
        assert_eq!(settings.message_delay, Duration::from_millis(250));
        assert_eq!(settings.max_flood_waits, 2);
    }

    #[test]
    fn export_path_is_under_processed() {
        let config = RunConfig::from_app_config(&app_config(&[("TGWH_BASE_PATH", "/srv/tgwh")]), &[]);
        assert_eq!(
            config.detection_export_path(),
            PathBuf::from("/srv/tgwh/processed/image_detections.csv")
        );
    }
}
