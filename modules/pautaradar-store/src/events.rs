//! Event rows, event-doc links, and the append-only state history.
//!
//! Every status change goes through `transition_event_status` so the
//! `events.status` column and the `event_state` history never diverge.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use pautaradar_common::{EventStatus, Pool as WorkerPool};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub canonical_event_id: Option<i64>,
    pub status: String,
    pub lane: Option<String>,
    pub summary: Option<String>,
    pub flags_json: Option<serde_json::Value>,
    pub score_plantao: f64,
    pub origin_pool: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    pub fn status(&self) -> EventStatus {
        self.status.parse().unwrap_or(EventStatus::New)
    }

    pub fn is_tombstone(&self) -> bool {
        self.canonical_event_id.is_some()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventStateRow {
    pub id: i64,
    pub event_id: i64,
    pub status: String,
    pub status_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub status: EventStatus,
    pub lane: Option<String>,
    pub summary: Option<String>,
    pub score_plantao: f64,
    pub origin_pool: WorkerPool,
}

/// Aggregated scoring inputs over the documents linked to one event.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventAggregates {
    pub best_tier: Option<i16>,
    pub diversity: i64,
    pub has_official: Option<bool>,
    pub has_tier1: Option<bool>,
    pub velocity: i64,
    pub max_evidence: f64,
    pub has_pdf: bool,
}

pub async fn get_event(conn: &mut PgConnection, event_id: i64) -> Result<Option<EventRow>> {
    let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

pub async fn create_event(conn: &mut PgConnection, event: &NewEvent) -> Result<EventRow> {
    let row = sqlx::query_as::<_, EventRow>(
        r#"
        INSERT INTO events (status, lane, summary, score_plantao, origin_pool)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(event.status.as_str())
    .bind(&event.lane)
    .bind(&event.summary)
    .bind(event.score_plantao)
    .bind(event.origin_pool.as_str())
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn touch_last_seen(conn: &mut PgConnection, event_id: i64) -> Result<()> {
    sqlx::query("UPDATE events SET last_seen_at = now(), updated_at = now() WHERE id = $1")
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Link a document to an event. The primary key on (event_id, doc_id) makes
/// retries harmless.
pub async fn insert_event_doc(
    conn: &mut PgConnection,
    event_id: i64,
    doc_id: i64,
    source_pk: Option<i64>,
    is_primary: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO event_docs (event_id, doc_id, source_id, is_primary)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (event_id, doc_id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(doc_id)
    .bind(source_pk)
    .bind(is_primary)
    .execute(conn)
    .await?;
    Ok(())
}

async fn append_state(
    conn: &mut PgConnection,
    event_id: i64,
    status: EventStatus,
    status_reason: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO event_state (event_id, status, status_reason)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(event_id)
    .bind(status.as_str())
    .bind(status_reason)
    .execute(conn)
    .await?;
    Ok(())
}

/// Update `events.status` and append one history row. Returns whether the
/// status actually changed. `force_history` writes the row even on a no-op
/// change (used right after event creation).
pub async fn transition_event_status(
    conn: &mut PgConnection,
    event_id: i64,
    new_status: EventStatus,
    status_reason: Option<&str>,
    force_history: bool,
) -> Result<bool> {
    let current = sqlx::query_scalar::<_, String>("SELECT status FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))?;

    let changed = current != new_status.as_str();
    if !changed && !force_history {
        return Ok(false);
    }

    sqlx::query("UPDATE events SET status = $1, updated_at = now() WHERE id = $2")
        .bind(new_status.as_str())
        .bind(event_id)
        .execute(&mut *conn)
        .await?;
    append_state(conn, event_id, new_status, status_reason).await?;
    Ok(changed)
}

/// Backfill the initial history row for events created before the history
/// write existed. No-op when any row is present.
pub async fn ensure_initial_state(conn: &mut PgConnection, event_id: i64) -> Result<bool> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM event_state WHERE event_id = $1 LIMIT 1",
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?;
    if existing.is_some() {
        return Ok(false);
    }
    let status = sqlx::query_scalar::<_, String>("SELECT status FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))?;
    let status: EventStatus = status.parse().unwrap_or(EventStatus::New);
    append_state(conn, event_id, status, Some("INITIAL_STATE_BACKFILL")).await?;
    Ok(true)
}

pub async fn update_flags(
    conn: &mut PgConnection,
    event_id: i64,
    flags: &serde_json::Value,
) -> Result<()> {
    sqlx::query("UPDATE events SET flags_json = $1, updated_at = now() WHERE id = $2")
        .bind(flags)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Aggregate the scoring inputs for one event.
pub async fn event_aggregates(
    conn: &mut PgConnection,
    event_id: i64,
    velocity_window_start: DateTime<Utc>,
) -> Result<EventAggregates> {
    let row = sqlx::query_as::<_, EventAggregates>(
        r#"
        SELECT
            MIN(s.tier)                                       AS best_tier,
            COUNT(DISTINCT ed.source_id)                      AS diversity,
            BOOL_OR(s.is_official)                            AS has_official,
            BOOL_OR(s.tier = 1)                               AS has_tier1,
            COUNT(*) FILTER (WHERE ed.seen_at >= $2)          AS velocity,
            COALESCE(MAX(f.evidence_score), 0)                AS max_evidence,
            COALESCE(BOOL_OR(f.has_pdf), FALSE)               AS has_pdf
        FROM event_docs ed
        LEFT JOIN sources s ON s.id = ed.source_id
        LEFT JOIN doc_evidence_features f ON f.doc_id = ed.doc_id
        WHERE ed.event_id = $1
        "#,
    )
    .bind(event_id)
    .bind(velocity_window_start)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

impl Store {
    pub async fn event(&self, event_id: i64) -> Result<Option<EventRow>> {
        let mut conn = self.pool().acquire().await?;
        get_event(&mut conn, event_id).await
    }

    /// Follow tombstone pointers to the canonical event.
    pub async fn resolve_canonical(&self, event_id: i64) -> Result<Option<EventRow>> {
        let mut current = match self.event(event_id).await? {
            Some(row) => row,
            None => return Ok(None),
        };
        // Chains are short; merges always point at a live canonical event.
        for _ in 0..8 {
            match current.canonical_event_id {
                Some(next_id) => {
                    current = match self.event(next_id).await? {
                        Some(row) => row,
                        None => return Ok(Some(current)),
                    };
                }
                None => break,
            }
        }
        Ok(Some(current))
    }

    pub async fn state_history(&self, event_id: i64) -> Result<Vec<EventStateRow>> {
        let rows = sqlx::query_as::<_, EventStateRow>(
            r#"
            SELECT id, event_id, status, status_reason, updated_at
            FROM event_state
            WHERE event_id = $1
            ORDER BY updated_at ASC, id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Events currently subject to maintenance timeouts.
    pub async fn events_in_status(&self, statuses: &[EventStatus]) -> Result<Vec<EventRow>> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT * FROM events WHERE status = ANY($1) AND canonical_event_id IS NULL",
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Candidate groups for canonicalization: strong anchors shared by live
    /// events first seen in the last day.
    pub async fn strong_anchor_groups(
        &self,
        first_seen_after: DateTime<Utc>,
        strong_types: &[&str],
    ) -> Result<Vec<AnchorGroupRow>> {
        let types: Vec<String> = strong_types.iter().map(|s| s.to_string()).collect();
        let rows = sqlx::query_as::<_, AnchorGroupRow>(
            r#"
            SELECT DISTINCT e.id AS event_id, e.first_seen_at,
                   da.anchor_type, da.anchor_value
            FROM events e
            JOIN event_docs ed ON ed.event_id = e.id
            JOIN doc_anchors da ON da.doc_id = ed.doc_id
            WHERE e.canonical_event_id IS NULL
              AND e.status NOT IN ('MERGED', 'IGNORED', 'EXPIRED')
              AND e.first_seen_at >= $1
              AND da.anchor_type = ANY($2)
            "#,
        )
        .bind(first_seen_after)
        .bind(&types)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnchorGroupRow {
    pub event_id: i64,
    pub first_seen_at: DateTime<Utc>,
    pub anchor_type: String,
    pub anchor_value: String,
}
