//! Database operations for `raw.telegram_messages`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tgwh_core::Post;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `raw.telegram_messages`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RawMessageRow {
    pub message_id: i64,
    pub channel_name: String,
    pub channel_title: String,
    pub message_date: Option<DateTime<Utc>>,
    pub message_text: Option<String>,
    pub has_media: bool,
    pub image_path: Option<String>,
    pub views: i64,
    pub forwards: i64,
    pub loaded_at: DateTime<Utc>,
}

/// A post with an image that the classifier should look at.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PendingImageRow {
    pub message_id: i64,
    pub channel_name: String,
    pub image_path: String,
}

/// Outcome of [`upsert_posts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    /// Posts submitted to the upsert.
    pub submitted: usize,
    /// Rows that were inserted or had at least one changed column.
    pub written: usize,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Upserts posts keyed by `message_id` inside one transaction.
///
/// Conflicting rows are only rewritten when a column actually differs, so an
/// unchanged row keeps its original `loaded_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is then
/// rolled back.
pub async fn upsert_posts(pool: &PgPool, posts: &[Post]) -> Result<UpsertCounts, DbError> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for post in posts {
        let result = sqlx::query(
            "INSERT INTO raw.telegram_messages \
                 (message_id, channel_name, channel_title, message_date, message_text, \
                  has_media, image_path, views, forwards) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (message_id) DO UPDATE SET \
                 channel_name  = EXCLUDED.channel_name, \
                 channel_title = EXCLUDED.channel_title, \
                 message_date  = EXCLUDED.message_date, \
                 message_text  = EXCLUDED.message_text, \
                 has_media     = EXCLUDED.has_media, \
                 image_path    = EXCLUDED.image_path, \
                 views         = EXCLUDED.views, \
                 forwards      = EXCLUDED.forwards, \
                 loaded_at     = NOW() \
             WHERE (raw.telegram_messages.channel_name, raw.telegram_messages.channel_title, \
                    raw.telegram_messages.message_date, raw.telegram_messages.message_text, \
                    raw.telegram_messages.has_media, raw.telegram_messages.image_path, \
                    raw.telegram_messages.views, raw.telegram_messages.forwards) \
                   IS DISTINCT FROM \
                   (EXCLUDED.channel_name, EXCLUDED.channel_title, EXCLUDED.message_date, \
                    EXCLUDED.message_text, EXCLUDED.has_media, EXCLUDED.image_path, \
                    EXCLUDED.views, EXCLUDED.forwards)",
        )
        .bind(post.message_id)
        .bind(&post.channel_name)
        .bind(&post.channel_title)
        .bind(post.message_date)
        .bind(&post.message_text)
        .bind(post.has_media)
        .bind(&post.image_path)
        .bind(post.views)
        .bind(post.forwards)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            written += 1;
        }
    }

    tx.commit().await?;

    Ok(UpsertCounts {
        submitted: posts.len(),
        written,
    })
}

/// Total number of rows in the raw post table.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_raw_messages(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM raw.telegram_messages")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Fetches a single post by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// query fails.
pub async fn get_raw_message(pool: &PgPool, message_id: i64) -> Result<RawMessageRow, DbError> {
    sqlx::query_as::<_, RawMessageRow>(
        "SELECT message_id, channel_name, channel_title, message_date, message_text, \
                has_media, image_path, views, forwards, loaded_at \
         FROM raw.telegram_messages \
         WHERE message_id = $1",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Posts with an image reference, ordered by id.
///
/// Without `rescan`, posts that already have an enrichment row are excluded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn posts_pending_enrichment(
    pool: &PgPool,
    rescan: bool,
) -> Result<Vec<PendingImageRow>, DbError> {
    let rows = sqlx::query_as::<_, PendingImageRow>(
        "SELECT m.message_id, m.channel_name, m.image_path \
         FROM raw.telegram_messages m \
         WHERE m.has_media \
           AND m.image_path IS NOT NULL \
           AND ($1 OR NOT EXISTS ( \
               SELECT 1 FROM raw.enriched_messages e WHERE e.message_id = m.message_id)) \
         ORDER BY m.message_id",
    )
    .bind(rescan)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
