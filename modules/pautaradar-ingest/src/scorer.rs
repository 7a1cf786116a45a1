//! Scoring worker: aggregates an event's documents and sources, computes the
//! dual score, persists it, derives flags, and proposes the next status.
//! Alerts fire only when the status actually changes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use pautaradar_common::scoring::{
    calculate_oceano_score, calculate_plantao_score, EventSignals,
};
use pautaradar_common::state::{
    check_unverified_viral, propose_status, FLAG_UNVERIFIED_VIRAL, SCORE_HOT, SCORE_HYDRATING,
    SCORE_QUARANTINE,
};
use pautaradar_common::EventStatus;
use pautaradar_store::events::{event_aggregates, transition_event_status, update_flags};
use pautaradar_store::scores::upsert_score;

use crate::context::WorkerContext;
use crate::queue::{AlertTask, Queues, ScoreTask};

/// Velocity window: documents linked in the last 30 minutes.
const VELOCITY_WINDOW_MIN: i64 = 30;

pub async fn run_scoring(ctx: Arc<WorkerContext>, task: ScoreTask) {
    if let Err(e) = score_event(&ctx, task.event_id).await {
        warn!(event_id = task.event_id, error = %e, "Scoring failed");
    }
}

async fn score_event(ctx: &WorkerContext, event_id: i64) -> anyhow::Result<()> {
    let Some(event) = ctx.store.event(event_id).await? else {
        warn!(event_id, "Scoring skipped: event not found");
        return Ok(());
    };
    if event.is_tombstone() {
        return Ok(());
    }

    let now = Utc::now();
    let mut conn = ctx.store.pool().acquire().await?;
    let aggregates = event_aggregates(
        &mut conn,
        event_id,
        now - Duration::minutes(VELOCITY_WINDOW_MIN),
    )
    .await?;

    let has_tier1 = aggregates.has_tier1.unwrap_or(false);
    let signals = EventSignals {
        tier: aggregates.best_tier.map(|t| t as u8).unwrap_or(3),
        velocity: aggregates.velocity as f64,
        diversity: aggregates.diversity as u32,
        has_official: aggregates.has_official.unwrap_or(false),
        has_tier1,
        max_evidence: aggregates.max_evidence,
        has_pdf_evidence: aggregates.has_pdf,
        coverage_lag_min: if has_tier1 {
            0.0
        } else {
            (now - event.first_seen_at).num_minutes().max(0) as f64
        },
        impact: 0.0,
        trust_penalty: 0.0,
        first_seen_at: event.first_seen_at,
    };

    let plantao = calculate_plantao_score(&signals, now);
    let oceano = calculate_oceano_score(&signals);

    let reasons = serde_json::json!({
        "plantao": plantao.reasons,
        "oceano": oceano.reasons,
    });
    upsert_score(&mut conn, event_id, plantao.score, oceano.score, &reasons).await?;

    let lane = event.lane.clone().unwrap_or_else(|| "geral".to_string());
    ctx.metrics
        .event_score
        .with_label_values(&["plantao", &lane])
        .observe(plantao.score.clamp(0.0, 100.0));
    ctx.metrics
        .event_score
        .with_label_values(&["oceano_azul", &lane])
        .observe(oceano.score.clamp(0.0, 100.0));

    // Flags: extreme velocity without verification breadth.
    if check_unverified_viral(signals.velocity, signals.diversity) {
        let mut flags = event.flags_json.clone().unwrap_or_else(|| serde_json::json!({}));
        let newly_flagged = flags.get(FLAG_UNVERIFIED_VIRAL).is_none();
        if let Some(map) = flags.as_object_mut() {
            map.insert(FLAG_UNVERIFIED_VIRAL.to_string(), serde_json::json!(true));
        }
        update_flags(&mut conn, event_id, &flags).await?;
        if newly_flagged {
            ctx.metrics
                .unverified_viral_events_total
                .with_label_values(&[&lane])
                .inc();
        }
    }

    // Propose and apply the next status.
    let current = event.status();
    let mut state_changed = false;
    let mut applied_reason = "";
    if let Some(next) = propose_status(current, plantao.score, signals.diversity) {
        if next != current {
            let reason = match next {
                EventStatus::Quarantine => SCORE_QUARANTINE,
                EventStatus::Hot => SCORE_HOT,
                _ => SCORE_HYDRATING,
            };
            state_changed =
                transition_event_status(&mut conn, event_id, next, Some(reason), false).await?;
            if state_changed {
                applied_reason = reason;
                ctx.metrics
                    .event_state_transitions_total
                    .with_label_values(&[current.as_str(), next.as_str(), reason])
                    .inc();
            }
        }
    }

    info!(
        event_id,
        plantao = plantao.score,
        oceano = oceano.score,
        state_changed,
        "Scored event"
    );

    if state_changed {
        let task = AlertTask {
            event_id,
            plantao: serde_json::json!({
                "score": plantao.score,
                "reasons": plantao.reasons.iter().chain([&applied_reason]).collect::<Vec<_>>(),
            }),
            oceano: serde_json::json!({
                "score": oceano.score,
                "reasons": oceano.reasons,
            }),
        };
        Queues::send_or_drop(&ctx.queues.alerts, task, "alerts").await;
    }

    Ok(())
}
