use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How to invoke the external transformation tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSettings {
    pub program: String,
    pub args: Vec<String>,
    pub project_dir: PathBuf,
    pub timeout_secs: u64,
}

/// Cron trigger for the pipeline. Disabled unless explicitly enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub cron: String,
    pub enabled: bool,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub base_path: PathBuf,
    pub channels_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_url: String,
    pub source_token: Option<String>,
    pub source_timeout_secs: u64,
    pub source_user_agent: String,
    pub message_limit: usize,
    pub message_delay_ms: u64,
    pub channel_delay_ms: u64,
    pub max_flood_waits: u32,
    pub max_flood_wait_secs: u64,
    pub detector_url: String,
    pub detector_timeout_secs: u64,
    pub confidence_threshold: f64,
    pub transform: TransformSettings,
    pub schedule: ScheduleSettings,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("base_path", &self.base_path)
            .field("channels_path", &self.channels_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("source_url", &self.source_url)
            .field(
                "source_token",
                &self.source_token.as_ref().map(|_| "[redacted]"),
            )
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("source_user_agent", &self.source_user_agent)
            .field("message_limit", &self.message_limit)
            .field("message_delay_ms", &self.message_delay_ms)
            .field("channel_delay_ms", &self.channel_delay_ms)
            .field("max_flood_waits", &self.max_flood_waits)
            .field("max_flood_wait_secs", &self.max_flood_wait_secs)
            .field("detector_url", &self.detector_url)
            .field("detector_timeout_secs", &self.detector_timeout_secs)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("transform", &self.transform)
            .field("schedule", &self.schedule)
            .finish()
    }
}
