//! Periodic state maintenance: hydration timeouts and quarantine TTLs.
//! A missed tick is caught up by the next; transitions always flow through
//! the state service so history stays consistent.

use std::str::FromStr;

use chrono::Utc;
use tracing::{info, warn};

use pautaradar_common::state::{hydration_timeout, quarantine_expired, QUARANTINE_TTL_EXPIRED};
use pautaradar_common::{EventStatus, Pool};
use pautaradar_store::events::{ensure_initial_state, transition_event_status};

use crate::context::WorkerContext;
use crate::queue::{AlertTask, Queues};

pub async fn run_state_maintenance(ctx: &WorkerContext) {
    if let Err(e) = maintain(ctx).await {
        warn!(error = %e, "State maintenance tick failed");
    }
}

async fn maintain(ctx: &WorkerContext) -> anyhow::Result<()> {
    let now = Utc::now();
    let events = ctx
        .store
        .events_in_status(&[EventStatus::Hydrating, EventStatus::Quarantine])
        .await?;
    let mut transitioned = 0usize;

    for event in events {
        let mut conn = ctx.store.pool().acquire().await?;
        ensure_initial_state(&mut conn, event.id).await?;

        let (next, reason) = match event.status() {
            EventStatus::Hydrating => {
                // The pool recorded at event creation decides the SLO.
                let pool = event
                    .origin_pool
                    .as_deref()
                    .and_then(|p| Pool::from_str(p).ok())
                    .unwrap_or(Pool::Fast);
                match hydration_timeout(pool, event.first_seen_at, now, &ctx.slo) {
                    Some(reason) => (EventStatus::PartialEnrich, reason),
                    None => continue,
                }
            }
            EventStatus::Quarantine => {
                if quarantine_expired(event.updated_at, now, ctx.quarantine_ttl_s) {
                    (EventStatus::Expired, QUARANTINE_TTL_EXPIRED)
                } else {
                    continue;
                }
            }
            _ => continue,
        };

        let changed =
            transition_event_status(&mut conn, event.id, next, Some(reason), false).await?;
        if !changed {
            continue;
        }
        transitioned += 1;
        ctx.metrics
            .event_state_transitions_total
            .with_label_values(&[&event.status, next.as_str(), reason])
            .inc();
        Queues::send_or_drop(
            &ctx.queues.alerts,
            AlertTask {
                event_id: event.id,
                plantao: serde_json::json!({
                    "score": event.score_plantao,
                    "reasons": [reason],
                }),
                oceano: serde_json::json!({}),
            },
            "alerts",
        )
        .await;
    }

    if transitioned > 0 {
        info!(transitioned, "State maintenance transitioned events");
    }
    Ok(())
}
