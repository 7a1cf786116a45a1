//! Materialized dual scores per event.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventScoreRow {
    pub event_id: i64,
    pub score_plantao: f64,
    pub score_oceano_azul: f64,
    pub reasons_json: Option<serde_json::Value>,
    pub computed_at: DateTime<Utc>,
}

/// Scoring is idempotent with respect to its inputs, so last writer wins.
pub async fn upsert_score(
    conn: &mut PgConnection,
    event_id: i64,
    score_plantao: f64,
    score_oceano_azul: f64,
    reasons_json: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO event_scores (event_id, score_plantao, score_oceano_azul, reasons_json, computed_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (event_id) DO UPDATE SET
            score_plantao = EXCLUDED.score_plantao,
            score_oceano_azul = EXCLUDED.score_oceano_azul,
            reasons_json = EXCLUDED.reasons_json,
            computed_at = EXCLUDED.computed_at
        "#,
    )
    .bind(event_id)
    .bind(score_plantao)
    .bind(score_oceano_azul)
    .bind(reasons_json)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE events SET score_plantao = $1, updated_at = now() WHERE id = $2")
        .bind(score_plantao)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn get_score(conn: &mut PgConnection, event_id: i64) -> Result<Option<EventScoreRow>> {
    let row = sqlx::query_as::<_, EventScoreRow>(
        "SELECT * FROM event_scores WHERE event_id = $1",
    )
    .bind(event_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

impl Store {
    pub async fn event_score(&self, event_id: i64) -> Result<Option<EventScoreRow>> {
        let mut conn = self.pool().acquire().await?;
        get_score(&mut conn, event_id).await
    }
}
