//! Canonicalization: fold events that share a strong anchor.
//!
//! A periodic pass groups the last day's live events by strong
//! `(anchor_type, anchor_value)`. In each group the earliest event (ties by
//! smallest id) is canonical; the rest are absorbed via the merge service,
//! then the canonical event is rescored.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use pautaradar_common::state::HARD_ANCHOR_MATCH;

use crate::context::WorkerContext;
use crate::queue::{AlertTask, Queues, ScoreTask};

const STRONG_ANCHOR_TYPES: [&str; 5] = ["CNPJ", "CNJ", "PL", "SEI", "TCU"];
const CANONICAL_WINDOW_H: i64 = 24;

pub async fn run_canonicalize(ctx: &WorkerContext) {
    if let Err(e) = canonicalize(ctx).await {
        warn!(error = %e, "Canonicalization tick failed");
    }
}

async fn canonicalize(ctx: &WorkerContext) -> anyhow::Result<()> {
    let cutoff = Utc::now() - Duration::hours(CANONICAL_WINDOW_H);
    let rows = ctx.store.strong_anchor_groups(cutoff, &STRONG_ANCHOR_TYPES).await?;

    // (anchor_type, anchor_value) -> event_id -> earliest first_seen_at.
    let mut by_anchor: BTreeMap<(String, String), BTreeMap<i64, DateTime<Utc>>> = BTreeMap::new();
    for row in rows {
        let entry = by_anchor
            .entry((row.anchor_type, row.anchor_value))
            .or_default()
            .entry(row.event_id)
            .or_insert(row.first_seen_at);
        if row.first_seen_at < *entry {
            *entry = row.first_seen_at;
        }
    }

    let mut absorbed_this_pass: HashSet<i64> = HashSet::new();
    let mut canonicals_to_rescore: HashSet<i64> = HashSet::new();
    let mut merged_count = 0usize;

    for ((anchor_type, anchor_value), events) in by_anchor {
        if events.len() < 2 {
            continue;
        }
        let mut ordered: Vec<(i64, DateTime<Utc>)> =
            events.into_iter().map(|(id, seen)| (id, seen)).collect();
        ordered.sort_by_key(|(id, seen)| (*seen, *id));
        let canonical_id = ordered[0].0;

        for (absorbed_id, _) in ordered.into_iter().skip(1) {
            if absorbed_id == canonical_id || absorbed_this_pass.contains(&absorbed_id) {
                continue;
            }
            let outcome = match ctx
                .store
                .merge_event_into(
                    absorbed_id,
                    canonical_id,
                    HARD_ANCHOR_MATCH,
                    HARD_ANCHOR_MATCH,
                    serde_json::json!({
                        "anchor_type": anchor_type.as_str(),
                        "anchor_value": anchor_value.as_str(),
                    }),
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(absorbed_id, canonical_id, error = %e, "Merge failed");
                    continue;
                }
            };
            if !outcome.merged {
                continue;
            }

            absorbed_this_pass.insert(absorbed_id);
            canonicals_to_rescore.insert(canonical_id);
            merged_count += 1;
            ctx.metrics
                .merges_total
                .with_label_values(&[HARD_ANCHOR_MATCH])
                .inc();

            Queues::send_or_drop(
                &ctx.queues.alerts,
                AlertTask {
                    event_id: absorbed_id,
                    plantao: serde_json::json!({"score": 0.0, "reasons": ["EVENT_MERGED"]}),
                    oceano: serde_json::json!({
                        "score": 0.0,
                        "reasons": [format!("CANONICAL:{canonical_id}")],
                    }),
                },
                "alerts",
            )
            .await;
        }
    }

    for canonical_id in canonicals_to_rescore {
        Queues::send_or_drop(&ctx.queues.score, ScoreTask { event_id: canonical_id }, "score")
            .await;
    }

    if merged_count > 0 {
        info!(merged_count, "Canonicalization folded events");
    }
    Ok(())
}
