//! Warehouse access used by the stages.
//!
//! A session is opened per stage invocation and must be closed on every exit
//! path.

use async_trait::async_trait;
use sqlx::PgPool;
use tgwh_classifier::ImageRef;
use tgwh_core::{Enrichment, Post};
use tgwh_db::{PipelineRunRecord, PoolConfig, UpsertCounts};

use crate::error::PipelineError;

/// Opens warehouse sessions.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>, PipelineError>;
}

/// One open warehouse connection.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Create the raw tables and run ledger if they do not exist.
    async fn ensure_schema(&self) -> Result<(), PipelineError>;

    async fn upsert_posts(&self, posts: &[Post]) -> Result<UpsertCounts, PipelineError>;

    async fn count_posts(&self) -> Result<i64, PipelineError>;

    /// Posts with an image reference; without `rescan` only those lacking an enrichment.
    async fn pending_images(&self, rescan: bool) -> Result<Vec<ImageRef>, PipelineError>;

    async fn upsert_enrichment(&self, enrichment: &Enrichment) -> Result<(), PipelineError>;

    async fn record_run(&self, run: &PipelineRunRecord) -> Result<(), PipelineError>;

    async fn close(self: Box<Self>);
}

/// Postgres-backed connector. Each session owns its own pool.
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    database_url: String,
    pool_config: PoolConfig,
}

impl PgWarehouse {
    #[must_use]
    pub fn new(database_url: impl Into<String>, pool_config: PoolConfig) -> Self {
        Self {
            database_url: database_url.into(),
            pool_config,
        }
    }

    #[must_use]
    pub fn from_app_config(config: &tgwh_core::AppConfig) -> Self {
        Self::new(&config.database_url, PoolConfig::from_app_config(config))
    }
}

#[async_trait]
impl WarehouseConnector for PgWarehouse {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>, PipelineError> {
        let pool = tgwh_db::connect_pool(&self.database_url, self.pool_config).await?;
        tracing::debug!("warehouse session opened");
        Ok(Box::new(PgSession { pool }))
    }
}

struct PgSession {
    pool: PgPool,
}

#[async_trait]
impl WarehouseSession for PgSession {
    async fn ensure_schema(&self) -> Result<(), PipelineError> {
        let applied = tgwh_db::run_migrations(&self.pool).await?;
        if applied > 0 {
            tracing::info!(applied, "warehouse schema migrated");
        }
        Ok(())
    }

    async fn upsert_posts(&self, posts: &[Post]) -> Result<UpsertCounts, PipelineError> {
        Ok(tgwh_db::upsert_posts(&self.pool, posts).await?)
    }

    async fn count_posts(&self) -> Result<i64, PipelineError> {
        Ok(tgwh_db::count_raw_messages(&self.pool).await?)
    }

    async fn pending_images(&self, rescan: bool) -> Result<Vec<ImageRef>, PipelineError> {
        let rows = tgwh_db::posts_pending_enrichment(&self.pool, rescan).await?;
        Ok(rows
            .into_iter()
            .map(|row| ImageRef {
                message_id: row.message_id,
                channel_name: row.channel_name,
                image_path: row.image_path,
            })
            .collect())
    }

    async fn upsert_enrichment(&self, enrichment: &Enrichment) -> Result<(), PipelineError> {
        Ok(tgwh_db::upsert_enrichment(&self.pool, enrichment).await?)
    }

    async fn record_run(&self, run: &PipelineRunRecord) -> Result<(), PipelineError> {
        Ok(tgwh_db::record_pipeline_run(&self.pool, run).await?)
    }

    async fn close(self: Box<Self>) {
        self.pool.close().await;
        tracing::debug!("warehouse session closed");
    }
}
