//! Offline unit tests for tgwh-db pool configuration and row types.
//! These tests do not require a live database connection.

use std::collections::HashMap;
use std::env::VarError;

use tgwh_db::{PipelineRunRecord, PoolConfig, UpsertCounts};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://example"),
        ("TGWH_DB_MAX_CONNECTIONS", "42"),
        ("TGWH_DB_MIN_CONNECTIONS", "7"),
        ("TGWH_DB_ACQUIRE_TIMEOUT_SECS", "9"),
    ]);
    let app_config = tgwh_core::build_app_config(|key| {
        env.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    })
    .expect("config should build");

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn upsert_counts_default_is_zero() {
    let counts = UpsertCounts::default();
    assert_eq!(counts.submitted, 0);
    assert_eq!(counts.written, 0);
}

/// Compile-time smoke test for the ledger record shape.
#[test]
fn pipeline_run_record_has_expected_fields() {
    let record = PipelineRunRecord {
        run_id: uuid::Uuid::new_v4(),
        trigger_source: "cli".to_string(),
        state: "complete".to_string(),
        failed_stage: None,
        error_message: None,
        started_at: Some(chrono::Utc::now()),
        completed_at: None,
        stages: serde_json::json!([]),
    };
    assert_eq!(record.trigger_source, "cli");
    assert!(record.stages.as_array().is_some_and(Vec::is_empty));
}
