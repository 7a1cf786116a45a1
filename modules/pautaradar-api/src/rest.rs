//! Read-only JSON aggregates for the newsroom UI.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;

use pautaradar_store::feeds::{FeedEventRow, FeedFilter};

use crate::AppState;

#[derive(Deserialize)]
pub struct EventsQuery {
    status: Option<String>,
    lane: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct OceanoQuery {
    min_score: Option<f64>,
    limit: Option<i64>,
}

fn feed_event_json(row: &FeedEventRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.id,
        "status": row.status,
        "lane": row.lane,
        "summary": row.summary,
        "score": row.score_plantao,
        "score_oceano_azul": row.score_oceano_azul,
        "reasons_json": row.reasons_json,
        "flags": row.flags_json,
        "first_seen_at": row.first_seen_at,
        "last_seen_at": row.last_seen_at,
        "doc_count": row.doc_count,
        "source_count": row.source_count,
    })
}

async fn feed_response(
    state: &AppState,
    filter: FeedFilter,
) -> axum::response::Response {
    match state.store().feed_events(&filter).await {
        Ok(rows) => {
            let body: Vec<_> = rows.iter().map(feed_event_json).collect();
            Json(body).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load event feed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> impl IntoResponse {
    feed_response(
        &state,
        FeedFilter {
            status: params.status,
            lane: params.lane,
            min_oceano_score: None,
            limit: params.limit.unwrap_or(20),
        },
    )
    .await
}

pub async fn api_plantao(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> impl IntoResponse {
    feed_response(
        &state,
        FeedFilter {
            status: params.status,
            lane: params.lane,
            min_oceano_score: None,
            limit: params.limit.unwrap_or(30),
        },
    )
    .await
}

pub async fn api_oceano_azul(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OceanoQuery>,
) -> impl IntoResponse {
    match state
        .store()
        .oceano_feed(params.min_score.unwrap_or(0.0), params.limit.unwrap_or(30))
        .await
    {
        Ok(rows) => {
            let body: Vec<_> = rows.iter().map(feed_event_json).collect();
            Json(body).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load oceano feed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_event_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let event = match state.store().event(id).await {
        Ok(Some(event)) => event,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(event_id = id, error = %e, "Failed to load event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Tombstones answer with a redirect hint instead of stale content.
    if let Some(canonical_id) = event.canonical_event_id {
        return Json(serde_json::json!({
            "id": event.id,
            "status": event.status,
            "merged_into": canonical_id,
        }))
        .into_response();
    }

    let docs = state.store().documents_for_event(id).await.unwrap_or_default();
    let doc_ids: Vec<i64> = docs.iter().map(|(doc, _, _)| doc.id).collect();
    let anchors = state.store().anchors_for_docs(&doc_ids).await.unwrap_or_default();
    let score = state.store().event_score(id).await.ok().flatten();

    let docs_json: Vec<_> = docs
        .iter()
        .map(|(doc, is_primary, seen_at)| {
            serde_json::json!({
                "id": doc.id,
                "url": doc.url,
                "title": doc.title,
                "published_at": doc.published_at,
                "version_no": doc.version_no,
                "is_primary": is_primary,
                "seen_at": seen_at,
            })
        })
        .collect();
    let anchors_json: Vec<_> = anchors
        .iter()
        .map(|a| {
            serde_json::json!({
                "doc_id": a.doc_id,
                "type": a.anchor_type,
                "value": a.anchor_value,
            })
        })
        .collect();

    Json(serde_json::json!({
        "id": event.id,
        "status": event.status,
        "lane": event.lane,
        "summary": event.summary,
        "flags": event.flags_json,
        "score_plantao": event.score_plantao,
        "score_oceano_azul": score.as_ref().map(|s| s.score_oceano_azul),
        "reasons_json": score.as_ref().and_then(|s| s.reasons_json.clone()),
        "first_seen_at": event.first_seen_at,
        "last_seen_at": event.last_seen_at,
        "docs": docs_json,
        "anchors": anchors_json,
    }))
    .into_response()
}

pub async fn api_state_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store().state_history(id).await {
        Ok(rows) => {
            let body: Vec<_> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "status": row.status,
                        "status_reason": row.status_reason,
                        "updated_at": row.updated_at,
                    })
                })
                .collect();
            Json(body).into_response()
        }
        Err(e) => {
            warn!(event_id = id, error = %e, "Failed to load state history");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_merge_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store().merge_audit_for_event(id).await {
        Ok(rows) => {
            let body: Vec<_> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "from_event_id": row.from_event_id,
                        "to_event_id": row.to_event_id,
                        "reason_code": row.reason_code,
                        "evidence": row.evidence_json,
                        "created_at": row.created_at,
                    })
                })
                .collect();
            Json(body).into_response()
        }
        Err(e) => {
            warn!(event_id = id, error = %e, "Failed to load merge audit");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_feedback_list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store().feedback_for_event(id).await {
        Ok(rows) => {
            let body: Vec<_> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "action": row.action,
                        "actor": row.actor,
                        "payload": row.payload_json,
                        "created_at": row.created_at,
                    })
                })
                .collect();
            Json(body).into_response()
        }
        Err(e) => {
            warn!(event_id = id, error = %e, "Failed to load feedback");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
