//! Database operations for `raw.enriched_messages`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tgwh_core::Enrichment;

use crate::DbError;

/// A row from `raw.enriched_messages`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EnrichmentRow {
    pub message_id: i64,
    pub channel_name: String,
    pub image_path: String,
    pub detection_count: i32,
    pub image_category: String,
    pub confidence_score: f64,
    pub has_person: bool,
    pub has_product: bool,
    /// Comma-joined class names in detection order.
    pub detected_objects: String,
    pub detections: Value,
    pub enriched_at: DateTime<Utc>,
}

/// Inserts or overwrites the enrichment for `enrichment.message_id`.
///
/// The referenced post must already exist in `raw.telegram_messages`.
///
/// # Errors
///
/// Returns [`DbError::OutOfRange`] if the detection count does not fit the
/// column, or [`DbError::Sqlx`] if the upsert fails (including a missing
/// parent post).
pub async fn upsert_enrichment(pool: &PgPool, enrichment: &Enrichment) -> Result<(), DbError> {
    let detection_count =
        i32::try_from(enrichment.detection_count()).map_err(|_| DbError::OutOfRange {
            column: "detection_count",
            value: enrichment.detection_count().to_string(),
        })?;

    sqlx::query(
        "INSERT INTO raw.enriched_messages \
             (message_id, channel_name, image_path, detection_count, image_category, \
              confidence_score, has_person, has_product, detected_objects, detections) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (message_id) DO UPDATE SET \
             channel_name     = EXCLUDED.channel_name, \
             image_path       = EXCLUDED.image_path, \
             detection_count  = EXCLUDED.detection_count, \
             image_category   = EXCLUDED.image_category, \
             confidence_score = EXCLUDED.confidence_score, \
             has_person       = EXCLUDED.has_person, \
             has_product      = EXCLUDED.has_product, \
             detected_objects = EXCLUDED.detected_objects, \
             detections       = EXCLUDED.detections, \
             enriched_at      = NOW()",
    )
    .bind(enrichment.message_id)
    .bind(&enrichment.channel_name)
    .bind(&enrichment.image_path)
    .bind(detection_count)
    .bind(enrichment.category.as_str())
    .bind(enrichment.confidence_score)
    .bind(enrichment.has_person)
    .bind(enrichment.has_product)
    .bind(enrichment.detected_objects().join(","))
    .bind(Json(&enrichment.detections))
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if the post has no enrichment, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_enrichment(pool: &PgPool, message_id: i64) -> Result<EnrichmentRow, DbError> {
    sqlx::query_as::<_, EnrichmentRow>(
        "SELECT message_id, channel_name, image_path, detection_count, image_category, \
                confidence_score, has_person, has_product, detected_objects, detections, \
                enriched_at \
         FROM raw.enriched_messages \
         WHERE message_id = $1",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_enrichments(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM raw.enriched_messages")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
