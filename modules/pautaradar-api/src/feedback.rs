//! Editorial action endpoint.
//!
//! Every accepted action writes one feedback row before any state mutation.
//! Blocked actions answer 409 with a machine-readable code and mutate
//! nothing.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use pautaradar_common::state::{
    action_gating, hydration_timeout, EDITORIAL_MERGE, FEEDBACK_IGNORE, FEEDBACK_PAUTAR,
    FEEDBACK_SNOOZE,
};
use pautaradar_common::{EditorialAction, EventStatus, Pool};
use pautaradar_ingest::queue::{AlertTask, Queues, ScoreTask};
use pautaradar_store::events::{transition_event_status, EventRow};
use pautaradar_store::StoreError;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ActionPayload {
    pub user_id: Option<String>,
    pub target_event_id: Option<i64>,
    pub doc_ids: Option<Vec<i64>>,
    pub new_summary: Option<String>,
    pub new_lane: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Deserialize)]
pub struct ActionQuery {
    action: String,
}

fn error_body(status: StatusCode, detail: impl Into<String>) -> axum::response::Response {
    (status, Json(serde_json::json!({"detail": detail.into()}))).into_response()
}

fn hydration_elapsed(ctx: &pautaradar_ingest::WorkerContext, event: &EventRow) -> bool {
    let pool = event
        .origin_pool
        .as_deref()
        .and_then(|p| Pool::from_str(p).ok())
        .unwrap_or(Pool::Fast);
    hydration_timeout(pool, event.first_seen_at, Utc::now(), &ctx.slo).is_some()
}

pub async fn record_feedback(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(query): Query<ActionQuery>,
    Json(payload): Json<ActionPayload>,
) -> impl IntoResponse {
    let Ok(action) = EditorialAction::from_str(&query.action) else {
        return error_body(StatusCode::BAD_REQUEST, "Invalid editorial action");
    };

    let event = match state.store().event(event_id).await {
        Ok(Some(event)) => event,
        Ok(None) => return error_body(StatusCode::NOT_FOUND, "Event not found"),
        Err(e) => {
            warn!(event_id, error = %e, "Failed to load event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(block) = action_gating(
        action,
        event.status(),
        event.is_tombstone(),
        hydration_elapsed(&state.ctx, &event),
    ) {
        return error_body(StatusCode::CONFLICT, block.as_str());
    }

    let actor = payload.user_id.clone().unwrap_or_else(|| "anonymous".to_string());
    let payload_json = serde_json::json!({
        "user_id": payload.user_id.clone(),
        "target_event_id": payload.target_event_id,
        "doc_ids": payload.doc_ids.clone(),
        "new_summary": payload.new_summary.clone(),
        "new_lane": payload.new_lane.clone(),
        "metadata": payload.metadata.clone(),
    });
    if let Err(e) = state
        .store()
        .insert_feedback(event_id, action.as_str(), &actor, &payload_json)
        .await
    {
        warn!(event_id, error = %e, "Failed to persist feedback");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut state_changed = false;
    let mut merge_payload: Option<serde_json::Value> = None;
    let mut rescore: Vec<i64> = Vec::new();

    match action {
        EditorialAction::Ignore | EditorialAction::Snooze | EditorialAction::Pautar => {
            let (next, reason) = match action {
                EditorialAction::Ignore => (EventStatus::Ignored, FEEDBACK_IGNORE),
                EditorialAction::Snooze => (EventStatus::Quarantine, FEEDBACK_SNOOZE),
                _ => (EventStatus::Hot, FEEDBACK_PAUTAR),
            };
            let mut conn = match state.store().pool().acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(event_id, error = %e, "Failed to open connection");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            match transition_event_status(&mut conn, event_id, next, Some(reason), false).await {
                Ok(changed) => {
                    state_changed = changed;
                    if changed {
                        state
                            .ctx
                            .metrics
                            .event_state_transitions_total
                            .with_label_values(&[&event.status, next.as_str(), reason])
                            .inc();
                    }
                }
                Err(e) => {
                    warn!(event_id, error = %e, "Transition failed");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }

        EditorialAction::Merge => {
            let Some(target_event_id) = payload.target_event_id else {
                return error_body(StatusCode::BAD_REQUEST, "MERGE requires target_event_id");
            };
            if target_event_id == event_id {
                return error_body(StatusCode::BAD_REQUEST, "Cannot merge event into itself");
            }
            let target = match state.store().event(target_event_id).await {
                Ok(Some(target)) => target,
                Ok(None) => return error_body(StatusCode::NOT_FOUND, "Target event not found"),
                Err(e) => {
                    warn!(target_event_id, error = %e, "Failed to load target event");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            };
            if let Err(block) = action_gating(
                EditorialAction::Merge,
                target.status(),
                target.is_tombstone(),
                hydration_elapsed(&state.ctx, &target),
            ) {
                return error_body(StatusCode::CONFLICT, block.as_str());
            }

            let evidence = serde_json::json!({"actor": actor, "source": "feedback_api"});
            match state
                .store()
                .merge_event_into(event_id, target_event_id, EDITORIAL_MERGE, EDITORIAL_MERGE, evidence)
                .await
            {
                Ok(outcome) => {
                    state_changed = outcome.merged;
                    if outcome.merged {
                        state
                            .ctx
                            .metrics
                            .merges_total
                            .with_label_values(&[EDITORIAL_MERGE])
                            .inc();
                        rescore.push(outcome.to_event_id);
                    }
                    merge_payload = Some(serde_json::json!({
                        "from_event_id": outcome.from_event_id,
                        "to_event_id": outcome.to_event_id,
                        "moved_docs": outcome.moved_docs,
                        "deduped_docs": outcome.deduped_docs,
                    }));
                }
                Err(StoreError::InvalidMerge(detail)) => {
                    return error_body(StatusCode::CONFLICT, detail);
                }
                Err(e) => {
                    warn!(event_id, target_event_id, error = %e, "Merge failed");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }

        EditorialAction::Split => {
            let doc_ids = payload.doc_ids.clone().unwrap_or_default();
            match state
                .store()
                .split_event_by_docs(
                    event_id,
                    &doc_ids,
                    payload.new_summary.as_deref(),
                    payload.new_lane.as_deref(),
                )
                .await
            {
                Ok(outcome) => {
                    merge_payload = Some(serde_json::json!({
                        "split": true,
                        "source_event_id": outcome.source_event_id,
                        "new_event_id": outcome.new_event_id,
                        "moved_docs": outcome.moved_docs,
                        "remaining_docs": outcome.remaining_docs,
                    }));
                    rescore.push(event_id);
                    rescore.push(outcome.new_event_id);
                }
                Err(StoreError::InvalidSplit(detail)) => {
                    return error_body(StatusCode::BAD_REQUEST, detail);
                }
                Err(e) => {
                    warn!(event_id, error = %e, "Split failed");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        }
    }

    if state_changed {
        Queues::send_or_drop(
            &state.ctx.queues.alerts,
            AlertTask {
                event_id,
                plantao: serde_json::json!({
                    "score": event.score_plantao,
                    "reasons": ["FEEDBACK_STATE_TRANSITION", action.as_str()],
                }),
                oceano: serde_json::json!({}),
            },
            "alerts",
        )
        .await;
    }
    for rescore_event_id in rescore {
        Queues::send_or_drop(
            &state.ctx.queues.score,
            ScoreTask { event_id: rescore_event_id },
            "score",
        )
        .await;
    }

    info!(event_id, action = %action, state_changed, "Feedback recorded");
    Json(serde_json::json!({
        "status": "recorded",
        "event_id": event_id,
        "action": action.as_str(),
        "state_changed": state_changed,
        "merge": merge_payload,
    }))
    .into_response()
}
