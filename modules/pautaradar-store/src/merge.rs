//! Tombstone merges.
//!
//! Absorbing event B into canonical A reassigns B's documents, keeps exactly
//! one primary on A, widens A's timeline, unions flags, keeps the strongest
//! scores, marks B as MERGED with `canonical_event_id = A`, and appends one
//! merge_audit row. The whole operation is a single transaction and is
//! idempotent per `(from, to, reason_code)`.

use sqlx::PgConnection;
use tracing::info;

use pautaradar_common::EventStatus;

use crate::error::{Result, StoreError};
use crate::events;
use crate::Store;

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged: bool,
    pub from_event_id: i64,
    pub to_event_id: i64,
    pub moved_docs: i64,
    pub deduped_docs: i64,
    pub reason_code: String,
}

impl MergeOutcome {
    fn skipped(from: i64, to: i64, reason_code: &str) -> Self {
        Self {
            merged: false,
            from_event_id: from,
            to_event_id: to,
            moved_docs: 0,
            deduped_docs: 0,
            reason_code: reason_code.to_string(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RelRow {
    doc_id: i64,
    is_primary: bool,
}

impl Store {
    pub async fn merge_event_into(
        &self,
        absorbed_id: i64,
        canonical_id: i64,
        reason_code: &str,
        status_reason: &str,
        evidence: serde_json::Value,
    ) -> Result<MergeOutcome> {
        if absorbed_id == canonical_id {
            return Ok(MergeOutcome::skipped(absorbed_id, canonical_id, reason_code));
        }

        let mut tx = self.pool().begin().await?;

        let absorbed = events::get_event(&mut tx, absorbed_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("event {absorbed_id}")))?;
        let canonical = events::get_event(&mut tx, canonical_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("event {canonical_id}")))?;

        if absorbed.canonical_event_id == Some(canonical_id) {
            return Ok(MergeOutcome::skipped(absorbed_id, canonical_id, reason_code));
        }
        if let Some(target) = canonical.canonical_event_id {
            return Err(StoreError::InvalidMerge(format!(
                "canonical target {canonical_id} is already merged into {target}"
            )));
        }

        let duplicate_audit = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM merge_audit
            WHERE from_event_id = $1 AND to_event_id = $2 AND reason_code = $3
            LIMIT 1
            "#,
        )
        .bind(absorbed_id)
        .bind(canonical_id)
        .bind(reason_code)
        .fetch_optional(&mut *tx)
        .await?;
        if duplicate_audit.is_some() {
            return Ok(MergeOutcome::skipped(absorbed_id, canonical_id, reason_code));
        }

        let canonical_rels = sqlx::query_as::<_, RelRow>(
            r#"
            SELECT doc_id, is_primary FROM event_docs
            WHERE event_id = $1
            ORDER BY seen_at ASC, doc_id ASC
            "#,
        )
        .bind(canonical_id)
        .fetch_all(&mut *tx)
        .await?;
        let absorbed_rels = sqlx::query_as::<_, RelRow>(
            r#"
            SELECT doc_id, is_primary FROM event_docs
            WHERE event_id = $1
            ORDER BY is_primary DESC, seen_at ASC, doc_id ASC
            "#,
        )
        .bind(absorbed_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut canonical_doc_ids: std::collections::HashSet<i64> =
            canonical_rels.iter().map(|r| r.doc_id).collect();
        let mut canonical_has_primary = canonical_rels.iter().any(|r| r.is_primary);
        let mut moved_docs = 0i64;
        let mut deduped_docs = 0i64;

        for rel in &absorbed_rels {
            if canonical_doc_ids.contains(&rel.doc_id) {
                sqlx::query("DELETE FROM event_docs WHERE event_id = $1 AND doc_id = $2")
                    .bind(absorbed_id)
                    .bind(rel.doc_id)
                    .execute(&mut *tx)
                    .await?;
                deduped_docs += 1;
                continue;
            }

            // Relations arrive primary-first, so when the canonical side has
            // no primary the absorbed primary (or oldest doc) takes over.
            let becomes_primary = !canonical_has_primary;
            sqlx::query(
                "UPDATE event_docs SET event_id = $1, is_primary = $2 WHERE event_id = $3 AND doc_id = $4",
            )
            .bind(canonical_id)
            .bind(becomes_primary)
            .bind(absorbed_id)
            .bind(rel.doc_id)
            .execute(&mut *tx)
            .await?;
            if becomes_primary {
                canonical_has_primary = true;
            }
            canonical_doc_ids.insert(rel.doc_id);
            moved_docs += 1;
        }

        if !canonical_has_primary {
            // Last resort: promote the oldest relation on the canonical side.
            sqlx::query(
                r#"
                UPDATE event_docs SET is_primary = TRUE
                WHERE event_id = $1 AND doc_id = (
                    SELECT doc_id FROM event_docs
                    WHERE event_id = $1
                    ORDER BY seen_at ASC, doc_id ASC
                    LIMIT 1
                )
                "#,
            )
            .bind(canonical_id)
            .execute(&mut *tx)
            .await?;
        }

        // Widen the canonical timeline; fill summary/lane only when empty;
        // union flags; keep the strongest materialized score.
        let mut merged_flags = canonical
            .flags_json
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        if let (Some(target), Some(source)) =
            (merged_flags.as_object_mut(), absorbed.flags_json.as_ref().and_then(|f| f.as_object()))
        {
            for (key, value) in source {
                target.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        sqlx::query(
            r#"
            UPDATE events SET
                first_seen_at = LEAST(first_seen_at, $2),
                last_seen_at = GREATEST(last_seen_at, $3),
                summary = COALESCE(summary, $4),
                lane = COALESCE(lane, $5),
                flags_json = $6,
                score_plantao = GREATEST(score_plantao, $7),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(canonical_id)
        .bind(absorbed.first_seen_at)
        .bind(absorbed.last_seen_at)
        .bind(&absorbed.summary)
        .bind(&absorbed.lane)
        .bind(&merged_flags)
        .bind(absorbed.score_plantao)
        .execute(&mut *tx)
        .await?;

        merge_scores(&mut tx, absorbed_id, canonical_id).await?;

        sqlx::query("UPDATE events SET canonical_event_id = $1, updated_at = now() WHERE id = $2")
            .bind(canonical_id)
            .bind(absorbed_id)
            .execute(&mut *tx)
            .await?;
        events::transition_event_status(
            &mut tx,
            absorbed_id,
            EventStatus::Merged,
            Some(status_reason),
            false,
        )
        .await?;

        let evidence = merge_evidence(evidence, moved_docs, deduped_docs);
        sqlx::query(
            r#"
            INSERT INTO merge_audit (from_event_id, to_event_id, reason_code, evidence_json)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(absorbed_id)
        .bind(canonical_id)
        .bind(reason_code)
        .bind(&evidence)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            from_event_id = absorbed_id,
            to_event_id = canonical_id,
            moved_docs,
            deduped_docs,
            reason_code,
            "Merged event into canonical"
        );

        Ok(MergeOutcome {
            merged: true,
            from_event_id: absorbed_id,
            to_event_id: canonical_id,
            moved_docs,
            deduped_docs,
            reason_code: reason_code.to_string(),
        })
    }
}

fn merge_evidence(
    mut evidence: serde_json::Value,
    moved_docs: i64,
    deduped_docs: i64,
) -> serde_json::Value {
    if !evidence.is_object() {
        evidence = serde_json::json!({});
    }
    if let Some(map) = evidence.as_object_mut() {
        map.insert("moved_docs".into(), serde_json::json!(moved_docs));
        map.insert("deduped_docs".into(), serde_json::json!(deduped_docs));
    }
    evidence
}

/// Merge event_scores rows by taking the maximum of each score; reasons are
/// copied only when the canonical side has none.
async fn merge_scores(
    conn: &mut PgConnection,
    absorbed_id: i64,
    canonical_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO event_scores (event_id, score_plantao, score_oceano_azul, reasons_json, computed_at)
        SELECT $2, score_plantao, score_oceano_azul, reasons_json, now()
        FROM event_scores WHERE event_id = $1
        ON CONFLICT (event_id) DO UPDATE SET
            score_plantao = GREATEST(event_scores.score_plantao, EXCLUDED.score_plantao),
            score_oceano_azul = GREATEST(event_scores.score_oceano_azul, EXCLUDED.score_oceano_azul),
            reasons_json = COALESCE(event_scores.reasons_json, EXCLUDED.reasons_json),
            computed_at = now()
        "#,
    )
    .bind(absorbed_id)
    .bind(canonical_id)
    .execute(conn)
    .await?;
    Ok(())
}
