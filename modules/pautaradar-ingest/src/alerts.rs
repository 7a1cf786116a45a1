//! Alert worker: dedupe by content hash, suppress within the cooldown,
//! persist to the single internal channel.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::context::WorkerContext;
use crate::queue::AlertTask;

/// Alert identity: event, score bands (width 5), and the reason arrays.
/// Equal keys inside the cooldown window are suppressed.
pub fn alert_hash(event_id: i64, plantao: &serde_json::Value, oceano: &serde_json::Value) -> String {
    fn band(data: &serde_json::Value) -> i64 {
        (data.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) / 5.0) as i64
    }
    fn reasons(data: &serde_json::Value) -> serde_json::Value {
        data.get("reasons").cloned().unwrap_or_else(|| serde_json::json!([]))
    }

    // serde_json object keys serialize sorted, so this string is canonical.
    let payload = serde_json::json!({
        "event_id": event_id,
        "plantao_reasons": reasons(plantao),
        "oceano_reasons": reasons(oceano),
        "plantao_band": band(plantao),
        "oceano_band": band(oceano),
    });
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub async fn run_alerts(ctx: Arc<WorkerContext>, task: AlertTask) {
    if let Err(e) = dispatch(&ctx, task).await {
        warn!(error = %e, "Alert dispatch failed");
    }
}

async fn dispatch(ctx: &WorkerContext, task: AlertTask) -> anyhow::Result<()> {
    let now = Utc::now();
    let Some(_event) = ctx.store.event(task.event_id).await? else {
        warn!(event_id = task.event_id, "Alert skipped: event not found");
        return Ok(());
    };

    let hash = alert_hash(task.event_id, &task.plantao, &task.oceano);

    if let Some(state) = ctx.store.alert_state(task.event_id).await? {
        if state.cooldown_until.is_some_and(|until| until > now) {
            info!(event_id = task.event_id, "Alert suppressed: cooldown active");
            return Ok(());
        }
        if state.last_alert_hash.as_deref() == Some(hash.as_str()) {
            info!(event_id = task.event_id, "Alert suppressed: duplicate hash");
            return Ok(());
        }
    }

    let payload = serde_json::json!({
        "event_id": task.event_id,
        "plantao": task.plantao,
        "oceano": task.oceano,
        "generated_at": now.to_rfc3339(),
    });
    let cooldown_until = now + Duration::seconds(ctx.alert_cooldown_s as i64);
    ctx.store.record_alert(task.event_id, &hash, &payload, cooldown_until).await?;

    info!(event_id = task.event_id, "Alert persisted to internal channel");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_stable_for_equal_inputs() {
        let p = json!({"score": 72.3, "reasons": ["PLANTAO_TIER_WEIGHT"]});
        let o = json!({"score": 15.0, "reasons": []});
        assert_eq!(alert_hash(1, &p, &o), alert_hash(1, &p, &o));
    }

    #[test]
    fn hash_ignores_score_noise_within_a_band() {
        let o = json!({});
        let a = alert_hash(1, &json!({"score": 71.0, "reasons": ["R"]}), &o);
        let b = alert_hash(1, &json!({"score": 74.9, "reasons": ["R"]}), &o);
        let c = alert_hash(1, &json!({"score": 75.0, "reasons": ["R"]}), &o);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_differs_by_event_and_reasons() {
        let p = json!({"score": 10.0, "reasons": ["A"]});
        let o = json!({});
        assert_ne!(alert_hash(1, &p, &o), alert_hash(2, &p, &o));
        assert_ne!(
            alert_hash(1, &p, &o),
            alert_hash(1, &json!({"score": 10.0, "reasons": ["B"]}), &o)
        );
    }
}
