//! CMS draft endpoint: assemble a structured draft payload from an event and
//! hand it to the connector. The connector is a best-effort collaborator; a
//! missing CMS never wedges the pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use tracing::{info, warn};

use crate::AppState;

/// Per-field confidence thresholds below which the draft needs review.
const FIELD_THRESHOLDS: [(&str, f64); 4] =
    [("person", 0.90), ("date", 0.85), ("value", 0.85), ("org", 0.80)];
const GLOBAL_THRESHOLD: f64 = 0.7;

const MAX_DRAFT_DOCS: usize = 5;
const MAX_DOC_CHARS: usize = 3000;

pub struct CmsConnector {
    api_url: Option<String>,
    client: reqwest::Client,
}

impl CmsConnector {
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("CMS_API_URL").ok().filter(|u| !u.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    /// Push a draft NewsArticle. Review flags are attached for every field
    /// whose confidence falls under its threshold.
    pub async fn create_draft(&self, event_id: i64, payload: &serde_json::Value) -> bool {
        let mut article = serde_json::json!({
            "title": payload.get("title"),
            "status": "DRAFT",
            "body": payload.get("clean_text"),
            "provenance": payload.get("sources"),
            "evidence": {
                "anchors": payload.get("anchors"),
                "evidence_score": payload.get("evidence_score"),
                "reasons": payload.get("reasons"),
            },
            "timeline": payload.get("timeline"),
            "created_at": Utc::now().to_rfc3339(),
        });

        let mut review_flags = Vec::new();
        let field_confidence = payload.get("field_confidence");
        for (field, threshold) in FIELD_THRESHOLDS {
            let Some(confidence) =
                field_confidence.and_then(|fc| fc.get(field)).and_then(|v| v.as_f64())
            else {
                continue;
            };
            if confidence < threshold {
                review_flags.push(serde_json::json!({
                    "field_type": field,
                    "confidence": confidence,
                    "threshold": threshold,
                }));
            }
        }
        let confidence = payload.get("confidence").and_then(|v| v.as_f64()).unwrap_or(1.0);
        if confidence < GLOBAL_THRESHOLD {
            review_flags.push(serde_json::json!({
                "field_type": "global",
                "confidence": confidence,
                "threshold": GLOBAL_THRESHOLD,
            }));
        }
        if !review_flags.is_empty() {
            if let Some(map) = article.as_object_mut() {
                map.insert("needs_review".into(), serde_json::json!(true));
                map.insert(
                    "review_reason".into(),
                    serde_json::json!("Confidence threshold not met"),
                );
                map.insert("review_flags".into(), serde_json::json!(review_flags));
            }
        }

        let Some(api_url) = &self.api_url else {
            info!(event_id, "CMS not configured; draft logged only");
            return true;
        };
        match self
            .client
            .post(format!("{}/drafts", api_url.trim_end_matches('/')))
            .json(&article)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(event_id, status = %resp.status(), "CMS draft push refused");
                false
            }
            Err(e) => {
                warn!(event_id, error = %e, "CMS draft push failed");
                false
            }
        }
    }
}

pub async fn create_cms_draft(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
) -> impl IntoResponse {
    let event = match state.store().event(event_id).await {
        Ok(Some(event)) => event,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(event_id, error = %e, "Failed to load event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Some(canonical_id) = event.canonical_event_id {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"detail": format!("Event merged into {canonical_id}")})),
        )
            .into_response();
    }

    let docs = state.store().documents_for_event(event_id).await.unwrap_or_default();
    if docs.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"detail": "Event has no documents"})),
        )
            .into_response();
    }

    let doc_ids: Vec<i64> = docs.iter().map(|(doc, _, _)| doc.id).collect();
    let anchors = state.store().anchors_for_docs(&doc_ids).await.unwrap_or_default();
    let entity_labels =
        state.store().entity_labels_for_docs(&doc_ids).await.unwrap_or_default();
    let score = state.store().event_score(event_id).await.ok().flatten();

    let sources: Vec<_> = docs
        .iter()
        .map(|(doc, _, _)| {
            serde_json::json!({
                "url": doc.url,
                "title": doc.title,
                "published_at": doc.published_at,
                "source_id": doc.source_id,
            })
        })
        .collect();
    let timeline: Vec<_> = docs
        .iter()
        .map(|(doc, is_primary, seen_at)| {
            serde_json::json!({
                "doc_id": doc.id,
                "seen_at": seen_at,
                "title": doc.title,
                "is_primary": is_primary,
            })
        })
        .collect();
    let anchors_json: Vec<_> = anchors
        .iter()
        .map(|a| {
            serde_json::json!({"type": a.anchor_type, "value": a.anchor_value, "doc_id": a.doc_id})
        })
        .collect();

    // Conservative field confidences derived from what was actually found.
    let has = |label: &str| entity_labels.iter().any(|l| l.as_str() == label);
    let has_anchor = |anchor_type: &str| anchors.iter().any(|a| a.anchor_type == anchor_type);
    let field_confidence = serde_json::json!({
        "person": if has("PER") { 0.75 } else { 1.0 },
        "date": if has_anchor("DATA") { 0.85 } else { 1.0 },
        "value": if has_anchor("VALOR") { 0.85 } else { 1.0 },
        "org": if has("ORG") { 0.8 } else { 1.0 },
    });

    let primary_title = docs
        .iter()
        .find(|(_, is_primary, _)| *is_primary)
        .or_else(|| docs.first())
        .and_then(|(doc, _, _)| doc.title.clone());
    let clean_text = docs
        .iter()
        .take(MAX_DRAFT_DOCS)
        .map(|(doc, _, _)| doc.clean_text.chars().take(MAX_DOC_CHARS).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n\n");

    let sources_count = sources.len();
    let anchors_count = anchors_json.len();
    let payload = serde_json::json!({
        "title": event.summary.clone().or(primary_title).unwrap_or_else(|| format!("Draft Event #{event_id}")),
        "clean_text": clean_text,
        "sources": sources,
        "anchors": anchors_json,
        "evidence_score": score.as_ref().map(|s| s.score_oceano_azul).unwrap_or(0.0),
        "reasons": score.as_ref().and_then(|s| s.reasons_json.clone()).unwrap_or_else(|| serde_json::json!({})),
        "timeline": timeline,
        "confidence": 0.8,
        "field_confidence": field_confidence,
    });

    let connector = CmsConnector::from_env();
    let ok = connector.create_draft(event_id, &payload).await;

    Json(serde_json::json!({
        "status": if ok { "draft_created" } else { "draft_failed" },
        "event_id": event_id,
        "payload_preview": {
            "title": payload.get("title"),
            "sources_count": sources_count,
            "anchors_count": anchors_count,
        },
    }))
    .into_response()
}
