//! The organizer: documents in, events out.
//!
//! Each extracted item is versioned against its URL identity, mined for
//! anchors, and linked to an event by (a) shared strong anchors in a 12-hour
//! window, (b) the prior version's event, or (c) SimHash proximity. Failing
//! all three, a new event is born in HYDRATING. All inserts and the linkage
//! decision commit in one transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use pautaradar_common::anchors::{compute_evidence_score, extract_anchors};
use pautaradar_common::deltas::anchor_delta;
use pautaradar_common::lanes::infer_editorial_lane;
use pautaradar_common::simhash::{best_match, compute_simhash64, NEAR_DUPLICATE_DISTANCE};
use pautaradar_common::state::FAST_PATH_EVENT_CREATED;
use pautaradar_common::{AnchorType, EventStatus};
use pautaradar_store::documents::{
    anchor_keys_for_doc, event_for_doc, find_event_by_strong_anchors, insert_anchors,
    insert_document, insert_entity_mentions, insert_evidence_feature, latest_document,
    recent_simhash_candidates, NewDocument, NewEntityMention, NewEvidenceFeature,
};
use pautaradar_store::events::{
    create_event, ensure_initial_state, insert_event_doc, touch_last_seen,
    transition_event_status, NewEvent,
};

use crate::context::WorkerContext;
use crate::extractor::{iso_or_none, truncate_chars};
use crate::queue::{OrganizeTask, Queues, ScoreTask};
use crate::yield_monitor::trigger_starvation_incident;

/// Window for strong-anchor and SimHash linkage.
const LINKAGE_WINDOW_H: i64 = 12;
/// Stored document text bound.
const MAX_CLEAN_TEXT_CHARS: usize = 20_000;
/// New events start here; tier-1 sources start hotter.
const BASE_SCORE: f64 = 40.0;
const TIER1_BASE_SCORE: f64 = 75.0;

pub async fn run_organization(ctx: Arc<WorkerContext>, task: OrganizeTask) {
    let profile = &task.profile;
    let Some(source_pk) = profile.id else {
        warn!(source_id = %profile.source_id, "Organizer aborted: profile has no catalog id");
        return;
    };

    match organize(&ctx, &task, source_pk).await {
        Ok(Some(outcome)) => {
            ctx.metrics
                .organizer_docs_total
                .with_label_values(&[
                    &profile.source_id,
                    &outcome.lane,
                    if outcome.matched_existing { "true" } else { "false" },
                ])
                .inc();
            Queues::send_or_drop(
                &ctx.queues.score,
                ScoreTask { event_id: outcome.event_id },
                "score",
            )
            .await;
        }
        Ok(None) => {
            // Same content hash as the stored version: nothing to do.
        }
        Err(e) => {
            warn!(source_id = %profile.source_id, url = %task.url, error = %e, "Organize transaction rolled back");
            ctx.metrics
                .organizer_failures_total
                .with_label_values(&[&profile.source_id])
                .inc();
        }
    }
}

struct OrganizeOutcome {
    event_id: i64,
    lane: String,
    matched_existing: bool,
}

fn parse_dt(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(iso_or_none)
        .and_then(|iso| DateTime::parse_from_rfc3339(&iso).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

async fn organize(
    ctx: &WorkerContext,
    task: &OrganizeTask,
    source_pk: i64,
) -> anyhow::Result<Option<OrganizeOutcome>> {
    let profile = &task.profile;
    let canonical_hint = task
        .doc_meta
        .canonical_url
        .as_deref()
        .map(|u| truncate_chars(u.trim(), 2048))
        .filter(|u| !u.is_empty());

    let mut tx = ctx.store.pool().begin().await?;

    // 1. Versioning: same identity + same content means a duplicate fetch.
    let existing = latest_document(&mut tx, &task.url, canonical_hint.as_deref()).await?;
    if let Some(prior) = &existing {
        if prior.content_hash == task.content_hash {
            info!(url = %task.url, "Document unchanged; skipping");
            return Ok(None);
        }
    }
    let version_no = existing.as_ref().map(|d| d.version_no + 1).unwrap_or(1);

    // 2. Intelligence: fingerprint, lane, anchors, evidence.
    let simhash = compute_simhash64(&task.text);
    let lane = infer_editorial_lane(
        task.title.as_deref(),
        &truncate_chars(&task.text, 500),
        profile.metadata.editoria.as_deref(),
    );
    let anchors = extract_anchors(&task.text);
    let evidence_score = compute_evidence_score(&anchors);

    // A new version of a known document gets a structured "what changed".
    if let Some(prior) = &existing {
        let prior_keys = anchor_keys_for_doc(&mut tx, prior.id).await?;
        let new_keys: Vec<String> =
            anchors.iter().map(|a| format!("{}:{}", a.anchor_type, a.value)).collect();
        let delta = anchor_delta(&prior_keys, &new_keys);
        if !delta.added.is_empty() || !delta.removed.is_empty() {
            info!(
                url = %task.url,
                version_no,
                added = ?delta.added,
                removed = ?delta.removed,
                "Anchor delta between document versions"
            );
        }
    }

    // 3. Yield bookkeeping; official sources are starvation-checked.
    ctx.yield_monitor.update_yield(source_pk, anchors.len() as u32, 200).await;
    if profile.is_official {
        let window_min = (profile.observability.window_h as i64) * 60;
        let starved = ctx
            .yield_monitor
            .check_starvation(
                source_pk,
                window_min,
                profile.observability.calendar_profile.as_deref(),
            )
            .await;
        if starved {
            let domain = profile.source_domain.as_deref().unwrap_or(&profile.source_id);
            trigger_starvation_incident(&ctx.metrics, source_pk, domain);
        }
    }
    ctx.metrics
        .anchor_yield_total
        .with_label_values(&[&profile.source_id])
        .inc_by(anchors.len() as u64);
    ctx.metrics
        .evidence_score
        .with_label_values(&[&profile.source_id])
        .observe(evidence_score);

    // 4. Document plus derived rows.
    let summary_fallback = format!(
        "Sinal: {}",
        profile.source_domain.as_deref().unwrap_or(&profile.source_id)
    );
    let title = task.title.clone().map(|t| truncate_chars(&t, 2000));
    let doc_id = insert_document(
        &mut tx,
        &NewDocument {
            source_pk,
            snapshot_id: task.doc_meta.snapshot_id,
            url: task.url.clone(),
            canonical_url: canonical_hint.clone().or_else(|| Some(task.url.clone())),
            title: title.clone().or_else(|| Some(summary_fallback.clone())),
            author: task
                .doc_meta
                .author
                .as_deref()
                .map(|a| truncate_chars(a.trim(), 512)),
            published_at: parse_dt(&task.doc_meta.published_at),
            modified_at: parse_dt(&task.doc_meta.modified_at),
            clean_text: truncate_chars(&task.text, MAX_CLEAN_TEXT_CHARS),
            lang: task
                .doc_meta
                .lang
                .clone()
                .or_else(|| Some(profile.lang.clone()))
                .map(|l| truncate_chars(&l, 8)),
            content_hash: task.content_hash.clone(),
            simhash,
            version_no,
        },
    )
    .await?;

    insert_anchors(&mut tx, doc_id, &anchors).await?;

    let mentions: Vec<NewEntityMention> = anchors
        .iter()
        .filter_map(|anchor| {
            anchor.anchor_type.entity_label().map(|label| NewEntityMention {
                entity_key: format!("{}:{}", anchor.anchor_type, anchor.value),
                label: label.as_str().to_string(),
                evidence_ptr: Some(anchor.ptr.clone()),
                confidence: 1.0,
            })
        })
        .collect();
    insert_entity_mentions(&mut tx, doc_id, &mentions).await?;

    let mut anchor_type_counts: HashMap<&str, u32> = HashMap::new();
    for anchor in &anchors {
        *anchor_type_counts.entry(anchor.anchor_type.as_str()).or_default() += 1;
    }
    let has_pdf = task.url.to_lowercase().ends_with(".pdf")
        || anchors.iter().any(|a| a.anchor_type == AnchorType::Pdf);
    let money_count = anchors.iter().filter(|a| a.anchor_type == AnchorType::Valor).count() as i32;
    let has_table_like =
        task.text.contains("[TABLE]") || (task.text.contains(" | ") && task.text.matches('\n').count() >= 2);
    insert_evidence_feature(
        &mut tx,
        doc_id,
        &NewEvidenceFeature {
            evidence_score,
            has_pdf,
            has_official_domain: profile.is_official,
            anchors_count: anchors.len() as i32,
            money_count,
            has_table_like,
            evidence_json: serde_json::json!({
                "anchor_type_counts": anchor_type_counts,
                "source_domain": profile.source_domain,
                "source_is_official": profile.is_official,
                "has_pdf": has_pdf,
                "has_table_like": has_table_like,
            }),
        },
    )
    .await?;

    // 5. Deferred merge: first match wins.
    let window_start = Utc::now() - Duration::hours(LINKAGE_WINDOW_H);
    let strong_pairs: Vec<(String, String)> = anchors
        .iter()
        .filter(|a| a.anchor_type.is_linkage_anchor())
        .map(|a| (a.anchor_type.as_str().to_string(), a.value.clone()))
        .collect();

    let mut target_event_id =
        find_event_by_strong_anchors(&mut tx, &strong_pairs, window_start).await?;

    if target_event_id.is_none() {
        if let Some(prior) = &existing {
            target_event_id = event_for_doc(&mut tx, prior.id).await?;
        }
    }

    if target_event_id.is_none() {
        if let Some(fingerprint) = simhash {
            let candidates = recent_simhash_candidates(&mut tx, window_start).await?;
            if let Some((best_doc, distance)) =
                best_match(fingerprint, &candidates, NEAR_DUPLICATE_DISTANCE)
            {
                if let Some(event_id) = event_for_doc(&mut tx, best_doc).await? {
                    info!(doc_id, event_id, distance, "SimHash near-duplicate linkage");
                    target_event_id = Some(event_id);
                }
            }
        }
    }

    // 6. Attach or create.
    let (event_id, matched_existing) = match target_event_id {
        Some(event_id) => {
            touch_last_seen(&mut tx, event_id).await?;
            ensure_initial_state(&mut tx, event_id).await?;
            insert_event_doc(&mut tx, event_id, doc_id, Some(source_pk), false).await?;
            info!(doc_id, event_id, "Linked document to existing event");
            (event_id, true)
        }
        None => {
            let base_score = if profile.tier == 1 { TIER1_BASE_SCORE } else { BASE_SCORE };
            let event = create_event(
                &mut tx,
                &NewEvent {
                    status: EventStatus::Hydrating,
                    lane: Some(lane.clone()),
                    summary: title.clone().or(Some(summary_fallback)),
                    score_plantao: base_score,
                    origin_pool: profile.pool,
                },
            )
            .await?;
            transition_event_status(
                &mut tx,
                event.id,
                EventStatus::Hydrating,
                Some(FAST_PATH_EVENT_CREATED),
                true,
            )
            .await?;
            insert_event_doc(&mut tx, event.id, doc_id, Some(source_pk), true).await?;
            info!(doc_id, event_id = event.id, "Created new event");
            (event.id, false)
        }
    };

    tx.commit().await?;

    Ok(Some(OrganizeOutcome { event_id, lane, matched_existing }))
}
