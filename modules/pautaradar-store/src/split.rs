//! Editorial split: move a proper subset of an event's documents to a new
//! event, re-electing a single primary on both sides. Single transaction.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::info;

use pautaradar_common::state::{EDITORIAL_SPLIT_CREATED, EDITORIAL_SPLIT_SOURCE_UPDATED};
use pautaradar_common::EventStatus;

use crate::error::{Result, StoreError};
use crate::events;
use crate::Store;

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub source_event_id: i64,
    pub new_event_id: i64,
    pub moved_docs: i64,
    pub remaining_docs: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RelRow {
    doc_id: i64,
    seen_at: DateTime<Utc>,
}

fn timeline(rels: &[&RelRow]) -> (DateTime<Utc>, DateTime<Utc>) {
    let min = rels.iter().map(|r| r.seen_at).min().unwrap_or_else(Utc::now);
    let max = rels.iter().map(|r| r.seen_at).max().unwrap_or(min);
    (min, max)
}

impl Store {
    pub async fn split_event_by_docs(
        &self,
        source_event_id: i64,
        doc_ids: &[i64],
        new_summary: Option<&str>,
        new_lane: Option<&str>,
    ) -> Result<SplitOutcome> {
        let mut requested: Vec<i64> = doc_ids.iter().copied().filter(|id| *id > 0).collect();
        requested.sort_unstable();
        requested.dedup();
        if requested.is_empty() {
            return Err(StoreError::InvalidSplit("SPLIT requires doc_ids".into()));
        }

        let mut tx = self.pool().begin().await?;

        let source = events::get_event(&mut tx, source_event_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("event {source_event_id}")))?;
        if source.is_tombstone() || source.status() == EventStatus::Merged {
            return Err(StoreError::InvalidSplit(format!(
                "source event {source_event_id} is a tombstone"
            )));
        }

        let all_rels = sqlx::query_as::<_, RelRow>(
            r#"
            SELECT doc_id, seen_at FROM event_docs
            WHERE event_id = $1
            ORDER BY seen_at ASC, doc_id ASC
            "#,
        )
        .bind(source_event_id)
        .fetch_all(&mut *tx)
        .await?;
        if all_rels.len() < 2 {
            return Err(StoreError::InvalidSplit(
                "cannot split an event with fewer than 2 docs".into(),
            ));
        }

        let moving: Vec<&RelRow> =
            all_rels.iter().filter(|r| requested.binary_search(&r.doc_id).is_ok()).collect();
        if moving.is_empty() {
            return Err(StoreError::InvalidSplit(
                "none of doc_ids belong to the source event".into(),
            ));
        }
        if moving.len() >= all_rels.len() {
            return Err(StoreError::InvalidSplit(
                "split must leave at least one document in the source event".into(),
            ));
        }
        let remaining: Vec<&RelRow> = all_rels
            .iter()
            .filter(|r| requested.binary_search(&r.doc_id).is_err())
            .collect();

        let (split_min, split_max) = timeline(&moving);
        let (source_min, source_max) = timeline(&remaining);

        let new_event = sqlx::query_as::<_, events::EventRow>(
            r#"
            INSERT INTO events
                (status, lane, summary, flags_json, score_plantao, origin_pool,
                 first_seen_at, last_seen_at)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(EventStatus::PartialEnrich.as_str())
        .bind(new_lane.map(str::to_string).or_else(|| source.lane.clone()))
        .bind(new_summary.map(str::to_string).or_else(|| source.summary.clone()))
        .bind(&source.flags_json)
        .bind(&source.origin_pool)
        .bind(split_min)
        .bind(split_max)
        .fetch_one(&mut *tx)
        .await?;
        events::transition_event_status(
            &mut tx,
            new_event.id,
            EventStatus::PartialEnrich,
            Some(EDITORIAL_SPLIT_CREATED),
            true,
        )
        .await?;

        for rel in &moving {
            sqlx::query(
                "UPDATE event_docs SET event_id = $1 WHERE event_id = $2 AND doc_id = $3",
            )
            .bind(new_event.id)
            .bind(source_event_id)
            .bind(rel.doc_id)
            .execute(&mut *tx)
            .await?;
        }

        elect_single_primary(&mut tx, new_event.id).await?;
        elect_single_primary(&mut tx, source_event_id).await?;

        events::ensure_initial_state(&mut tx, source_event_id).await?;
        sqlx::query(
            r#"
            UPDATE events SET first_seen_at = $2, last_seen_at = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(source_event_id)
        .bind(source_min)
        .bind(source_max)
        .execute(&mut *tx)
        .await?;
        events::transition_event_status(
            &mut tx,
            source_event_id,
            source.status(),
            Some(EDITORIAL_SPLIT_SOURCE_UPDATED),
            true,
        )
        .await?;

        tx.commit().await?;

        info!(
            source_event_id,
            new_event_id = new_event.id,
            moved = moving.len(),
            remaining = remaining.len(),
            "Split event"
        );

        Ok(SplitOutcome {
            source_event_id,
            new_event_id: new_event.id,
            moved_docs: moving.len() as i64,
            remaining_docs: remaining.len() as i64,
        })
    }
}

/// Keep exactly one primary: the existing one, else the oldest relation.
async fn elect_single_primary(conn: &mut PgConnection, event_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE event_docs SET is_primary = (ed.rn = 1)
        FROM (
            SELECT doc_id,
                   ROW_NUMBER() OVER (
                       ORDER BY is_primary DESC, seen_at ASC, doc_id ASC
                   ) AS rn
            FROM event_docs
            WHERE event_id = $1
        ) ed
        WHERE event_docs.event_id = $1 AND event_docs.doc_id = ed.doc_id
        "#,
    )
    .bind(event_id)
    .execute(conn)
    .await?;
    Ok(())
}
