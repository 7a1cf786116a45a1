//! Alert persistence and the per-event dedupe/cooldown state.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertStateRow {
    pub event_id: i64,
    pub last_alert_hash: Option<String>,
    pub last_alert_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl Store {
    pub async fn alert_state(&self, event_id: i64) -> Result<Option<AlertStateRow>> {
        let row = sqlx::query_as::<_, AlertStateRow>(
            "SELECT event_id, last_alert_hash, last_alert_at, cooldown_until FROM event_alert_state WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Persist one dispatched alert and arm the cooldown window.
    pub async fn record_alert(
        &self,
        event_id: i64,
        alert_hash: &str,
        payload: &serde_json::Value,
        cooldown_until: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO alerts (event_id, channel, payload_json, status)
            VALUES ($1, 'internal', $2, 'SENT')
            "#,
        )
        .bind(event_id)
        .bind(payload)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO event_alert_state (event_id, last_alert_hash, last_alert_at, cooldown_until)
            VALUES ($1, $2, now(), $3)
            ON CONFLICT (event_id) DO UPDATE SET
                last_alert_hash = EXCLUDED.last_alert_hash,
                last_alert_at = EXCLUDED.last_alert_at,
                cooldown_until = EXCLUDED.cooldown_until
            "#,
        )
        .bind(event_id)
        .bind(alert_hash)
        .bind(cooldown_until)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
