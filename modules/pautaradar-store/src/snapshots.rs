//! Content-addressed snapshots and per-fetch attempt rows.
//!
//! Snapshots are immutable: one row per (url, content) pair, keyed by
//! `snapshot_hash = SHA-256(url || content_hash)`. Attempts are appended for
//! every fetch, including failures and preflight blocks.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub id: i64,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub response_headers: Option<serde_json::Value>,
    pub content_hash: String,
    pub snapshot_hash: String,
}

/// Parameters for one appended fetch attempt.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub source_pk: Option<i64>,
    pub url: String,
    pub status_code: i32,
    pub error_class: Option<String>,
    pub latency_ms: i32,
    pub bytes: i64,
    pub pool: String,
    pub snapshot_hash: Option<String>,
}

impl Store {
    /// Most recent snapshot for a URL, used for conditional requests.
    pub async fn latest_snapshot(&self, url: &str) -> Result<Option<SnapshotRow>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, url, fetched_at, response_headers, content_hash, snapshot_hash
            FROM snapshots
            WHERE url = $1
            ORDER BY fetched_at DESC
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a snapshot unless the identical (url, content) pair already
    /// exists. Returns the snapshot id either way.
    pub async fn insert_snapshot(
        &self,
        url: &str,
        response_headers: &serde_json::Value,
        body: &str,
        content_hash: &str,
        snapshot_hash: &str,
    ) -> Result<i64> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO snapshots (url, response_headers, body, content_hash, snapshot_hash)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (snapshot_hash) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(url)
        .bind(response_headers)
        .bind(body)
        .bind(content_hash)
        .bind(snapshot_hash)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(id);
        }
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM snapshots WHERE snapshot_hash = $1",
        )
        .bind(snapshot_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(existing)
    }

    /// Append one fetch attempt. Logs instead of propagating: a failed
    /// bookkeeping write must not abort the fetch itself.
    pub async fn record_attempt(&self, attempt: NewAttempt) -> Option<i64> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO fetch_attempts
                (source_id, url, status_code, error_class, latency_ms, bytes, pool, snapshot_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(attempt.source_pk)
        .bind(&attempt.url)
        .bind(attempt.status_code)
        .bind(&attempt.error_class)
        .bind(attempt.latency_ms)
        .bind(attempt.bytes)
        .bind(&attempt.pool)
        .bind(&attempt.snapshot_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(url = %attempt.url, error = %e, "Failed to record fetch attempt");
                None
            }
        }
    }
}
