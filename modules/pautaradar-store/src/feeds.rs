//! Read-side feed queries for the editorial UI. Feeds only ever show
//! canonical events; tombstones are resolved at the detail boundary.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedEventRow {
    pub id: i64,
    pub status: String,
    pub lane: Option<String>,
    pub summary: Option<String>,
    pub score_plantao: f64,
    pub score_oceano_azul: Option<f64>,
    pub reasons_json: Option<serde_json::Value>,
    pub flags_json: Option<serde_json::Value>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub doc_count: i64,
    pub source_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub status: Option<String>,
    pub lane: Option<String>,
    pub min_oceano_score: Option<f64>,
    pub limit: i64,
}

impl Store {
    /// Feed of canonical events ordered by the plantão score.
    pub async fn feed_events(&self, filter: &FeedFilter) -> Result<Vec<FeedEventRow>> {
        let limit = if filter.limit <= 0 { 20 } else { filter.limit.min(200) };
        let rows = sqlx::query_as::<_, FeedEventRow>(
            r#"
            SELECT e.id, e.status, e.lane, e.summary, e.score_plantao,
                   s.score_oceano_azul, s.reasons_json, e.flags_json,
                   e.first_seen_at, e.last_seen_at,
                   COUNT(ed.doc_id)            AS doc_count,
                   COUNT(DISTINCT ed.source_id) AS source_count
            FROM events e
            LEFT JOIN event_scores s ON s.event_id = e.id
            LEFT JOIN event_docs ed ON ed.event_id = e.id
            WHERE e.canonical_event_id IS NULL
              AND e.status NOT IN ('MERGED', 'IGNORED', 'EXPIRED')
              AND ($1::text IS NULL OR e.status = $1)
              AND ($2::text IS NULL OR e.lane = $2)
              AND ($3::float8 IS NULL OR COALESCE(s.score_oceano_azul, 0) >= $3)
            GROUP BY e.id, s.score_oceano_azul, s.reasons_json
            ORDER BY e.score_plantao DESC, e.created_at DESC
            LIMIT $4
            "#,
        )
        .bind(&filter.status)
        .bind(&filter.lane)
        .bind(filter.min_oceano_score)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Feed ordered by the oceano-azul score instead.
    pub async fn oceano_feed(&self, min_score: f64, limit: i64) -> Result<Vec<FeedEventRow>> {
        let limit = if limit <= 0 { 20 } else { limit.min(200) };
        let rows = sqlx::query_as::<_, FeedEventRow>(
            r#"
            SELECT e.id, e.status, e.lane, e.summary, e.score_plantao,
                   s.score_oceano_azul, s.reasons_json, e.flags_json,
                   e.first_seen_at, e.last_seen_at,
                   COUNT(ed.doc_id)            AS doc_count,
                   COUNT(DISTINCT ed.source_id) AS source_count
            FROM events e
            JOIN event_scores s ON s.event_id = e.id
            LEFT JOIN event_docs ed ON ed.event_id = e.id
            WHERE e.canonical_event_id IS NULL
              AND e.status NOT IN ('MERGED', 'IGNORED', 'EXPIRED')
              AND s.score_oceano_azul >= $1
            GROUP BY e.id, s.score_oceano_azul, s.reasons_json
            ORDER BY s.score_oceano_azul DESC, e.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(min_score)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
