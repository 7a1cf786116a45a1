//! Cursor queries backing the push stream.
//!
//! Three record kinds, each with its own `(timestamp, id)` cursor: canonical
//! event upserts, state transitions, and merges. Cursors are per connection
//! and strictly monotonic; nothing here is persisted.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::events::{EventRow, EventStateRow};
use crate::Store;

/// A `(timestamp, id)` stream position. Rows are returned strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub ts: DateTime<Utc>,
    pub id: i64,
}

impl Cursor {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self { ts: now, id: 0 }
    }

    pub fn advance(&mut self, ts: DateTime<Utc>, id: i64) {
        self.ts = ts;
        self.id = id;
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MergeAuditRow {
    pub id: i64,
    pub from_event_id: i64,
    pub to_event_id: i64,
    pub reason_code: String,
    pub evidence_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Canonical events updated after the cursor, oldest first.
    pub async fn events_after(&self, cursor: Cursor, limit: i64) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM events
            WHERE canonical_event_id IS NULL
              AND (updated_at, id) > ($1, $2)
            ORDER BY updated_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(cursor.ts)
        .bind(cursor.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// State history rows appended after the cursor.
    pub async fn state_changes_after(
        &self,
        cursor: Cursor,
        limit: i64,
    ) -> Result<Vec<EventStateRow>> {
        let rows = sqlx::query_as::<_, EventStateRow>(
            r#"
            SELECT id, event_id, status, status_reason, updated_at
            FROM event_state
            WHERE (updated_at, id) > ($1, $2)
            ORDER BY updated_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(cursor.ts)
        .bind(cursor.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Merge audit rows appended after the cursor.
    pub async fn merges_after(&self, cursor: Cursor, limit: i64) -> Result<Vec<MergeAuditRow>> {
        let rows = sqlx::query_as::<_, MergeAuditRow>(
            r#"
            SELECT id, from_event_id, to_event_id, reason_code, evidence_json, created_at
            FROM merge_audit
            WHERE (created_at, id) > ($1, $2)
            ORDER BY created_at ASC, id ASC
            LIMIT $3
            "#,
        )
        .bind(cursor.ts)
        .bind(cursor.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Full merge audit for one event (either side).
    pub async fn merge_audit_for_event(&self, event_id: i64) -> Result<Vec<MergeAuditRow>> {
        let rows = sqlx::query_as::<_, MergeAuditRow>(
            r#"
            SELECT id, from_event_id, to_event_id, reason_code, evidence_json, created_at
            FROM merge_audit
            WHERE from_event_id = $1 OR to_event_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
