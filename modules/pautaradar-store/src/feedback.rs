//! Editorial action log. One row per action, written before any state
//! mutation so the feedback trail can replay the editorial history.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
    pub id: i64,
    pub event_id: i64,
    pub action: String,
    pub actor: Option<String>,
    pub payload_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub async fn insert_feedback(
        &self,
        event_id: i64,
        action: &str,
        actor: &str,
        payload: &serde_json::Value,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO feedback_events (event_id, action, actor, payload_json)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(action)
        .bind(actor)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn feedback_for_event(&self, event_id: i64) -> Result<Vec<FeedbackRow>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id, event_id, action, actor, payload_json, created_at
            FROM feedback_events
            WHERE event_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
