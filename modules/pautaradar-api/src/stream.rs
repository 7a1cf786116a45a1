//! Live push stream: named SSE events for upserts, state changes, merges.
//!
//! Each connection owns three in-memory cursors starting at connect time.
//! The generator polls the store roughly once a second and emits a `ping`
//! heartbeat when nothing moved; cursors are never persisted.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures::Stream;
use tracing::warn;

use pautaradar_store::stream::Cursor;

use crate::AppState;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const BATCH_LIMIT: i64 = 100;

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream! {
        let now = Utc::now();
        let mut upsert_cursor = Cursor::start(now);
        let mut state_cursor = Cursor::start(now);
        let mut merge_cursor = Cursor::start(now);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let mut emitted = false;

            match state.store().events_after(upsert_cursor, BATCH_LIMIT).await {
                Ok(rows) => {
                    for row in rows {
                        upsert_cursor.advance(row.updated_at, row.id);
                        let data = serde_json::json!({
                            "id": row.id,
                            "status": row.status,
                            "lane": row.lane,
                            "summary": row.summary,
                            "score_plantao": row.score_plantao,
                            "flags": row.flags_json,
                            "updated_at": row.updated_at,
                        });
                        state.ctx.metrics.sse_events_sent_total
                            .with_label_values(&["EVENT_UPSERT"]).inc();
                        emitted = true;
                        yield Ok(Event::default().event("EVENT_UPSERT").data(data.to_string()));
                    }
                }
                Err(e) => warn!(error = %e, "Stream upsert poll failed"),
            }

            match state.store().state_changes_after(state_cursor, BATCH_LIMIT).await {
                Ok(rows) => {
                    for row in rows {
                        state_cursor.advance(row.updated_at, row.id);
                        let data = serde_json::json!({
                            "event_id": row.event_id,
                            "status": row.status,
                            "status_reason": row.status_reason,
                            "updated_at": row.updated_at,
                        });
                        state.ctx.metrics.sse_events_sent_total
                            .with_label_values(&["EVENT_STATE_CHANGED"]).inc();
                        emitted = true;
                        yield Ok(Event::default().event("EVENT_STATE_CHANGED").data(data.to_string()));
                    }
                }
                Err(e) => warn!(error = %e, "Stream state poll failed"),
            }

            match state.store().merges_after(merge_cursor, BATCH_LIMIT).await {
                Ok(rows) => {
                    for row in rows {
                        merge_cursor.advance(row.created_at, row.id);
                        let data = serde_json::json!({
                            "from_event_id": row.from_event_id,
                            "to_event_id": row.to_event_id,
                            "reason_code": row.reason_code,
                            "created_at": row.created_at,
                        });
                        state.ctx.metrics.sse_events_sent_total
                            .with_label_values(&["EVENT_MERGED"]).inc();
                        emitted = true;
                        yield Ok(Event::default().event("EVENT_MERGED").data(data.to_string()));
                    }
                }
                Err(e) => warn!(error = %e, "Stream merge poll failed"),
            }

            if !emitted {
                state.ctx.metrics.sse_events_sent_total.with_label_values(&["ping"]).inc();
                yield Ok(Event::default().event("ping").data("{}"));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
