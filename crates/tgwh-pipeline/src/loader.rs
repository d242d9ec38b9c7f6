//! Landing partitions into `raw.telegram_messages`.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tgwh_core::Post;
use tgwh_db::UpsertCounts;
use tgwh_landing::LandingStore;

use crate::error::PipelineError;
use crate::warehouse::WarehouseSession;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Date whose partitions were consumed.
    pub date: Option<NaiveDate>,
    /// Set when no partition existed for the requested date and an earlier one was used.
    pub fell_back: bool,
    pub partitions: Vec<String>,
    /// Valid records submitted to the upsert.
    pub records_upserted: usize,
    /// Rows inserted or changed by the upsert.
    pub rows_written: usize,
    pub malformed: usize,
    /// Well-formed records the warehouse refused.
    pub rejected: usize,
    /// Row count of the raw table after the load.
    pub total_rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(LoadReport),
    /// Nothing to load for the requested date or any earlier one.
    NoPartitions { requested: NaiveDate },
}

/// Load the partitions of `date` (today, UTC, when `None`) into the warehouse.
///
/// The schema is ensured first on every call. Malformed records are logged and
/// counted; each partition is upserted in its own transaction and the date is
/// archived once all of them are in. When a partition's transaction fails it
/// is retried record by record, and the records the warehouse still refuses
/// are counted as rejected.
///
/// # Errors
///
/// Returns an error when the schema cannot be ensured, a partition cannot be
/// read, or the final row count fails.
pub async fn load_partitions(
    store: &LandingStore,
    session: &dyn WarehouseSession,
    date: Option<NaiveDate>,
) -> Result<LoadOutcome, PipelineError> {
    session.ensure_schema().await?;

    let listing = store.list_partitions(date)?;
    let Some(partition_date) = listing.date.filter(|_| !listing.is_empty()) else {
        tracing::warn!(requested = %listing.requested, "no landing partitions found");
        return Ok(LoadOutcome::NoPartitions {
            requested: listing.requested,
        });
    };
    let mut report = LoadReport {
        date: Some(partition_date),
        fell_back: listing.fell_back,
        ..LoadReport::default()
    };

    for partition in &listing.partitions {
        let contents = store.read(partition)?;
        for bad in &contents.malformed {
            tracing::warn!(
                channel = %partition.channel_name,
                index = bad.index,
                message_id = ?bad.message_id,
                reason = %bad.reason,
                "skipping malformed record"
            );
        }

        let (counts, rejected) = match session.upsert_posts(&contents.posts).await {
            Ok(counts) => (counts, 0),
            Err(e) => {
                tracing::warn!(
                    channel = %partition.channel_name,
                    error = %e,
                    "partition upsert failed, retrying record by record"
                );
                upsert_each(session, &partition.channel_name, &contents.posts).await
            }
        };
        tracing::info!(
            channel = %partition.channel_name,
            records = counts.submitted,
            written = counts.written,
            malformed = contents.malformed.len(),
            rejected,
            "partition loaded"
        );

        report.partitions.push(partition.channel_name.clone());
        report.records_upserted += counts.submitted;
        report.rows_written += counts.written;
        report.malformed += contents.malformed.len();
        report.rejected += rejected;
    }

    store.archive(partition_date, &listing.partitions, Utc::now())?;
    report.total_rows = session.count_posts().await?;

    tracing::info!(
        date = %partition_date,
        partitions = report.partitions.len(),
        upserted = report.records_upserted,
        written = report.rows_written,
        malformed = report.malformed,
        rejected = report.rejected,
        total_rows = report.total_rows,
        "load finished"
    );

    Ok(LoadOutcome::Loaded(report))
}

/// Upsert posts one at a time so a single refused record does not take the
/// rest of the partition with it. Returns the combined counts and the number
/// of refused records.
async fn upsert_each(
    session: &dyn WarehouseSession,
    channel: &str,
    posts: &[Post],
) -> (UpsertCounts, usize) {
    let mut counts = UpsertCounts::default();
    let mut rejected = 0;
    for post in posts {
        match session.upsert_posts(std::slice::from_ref(post)).await {
            Ok(one) => {
                counts.submitted += one.submitted;
                counts.written += one.written;
            }
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    message_id = post.message_id,
                    error = %e,
                    "warehouse rejected record"
                );
                rejected += 1;
            }
        }
    }
    (counts, rejected)
}
