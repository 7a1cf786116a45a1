//! Scheduler tick: turn per-source cadences into fetch tasks.
//!
//! Stateless: the only per-source memory is the timestamp of the latest
//! fetch attempt, read back from the attempts table.

use chrono::Utc;
use tracing::{info, warn};

use crate::context::WorkerContext;
use crate::queue::{FetchTask, Queues};

pub async fn orchestrate_fetches(ctx: &WorkerContext) {
    let profiles = match ctx.store.enabled_profiles().await {
        Ok(profiles) => profiles,
        Err(e) => {
            warn!(error = %e, "Scheduler tick failed to load source profiles");
            return;
        }
    };

    let now = Utc::now();
    let mut dispatched = 0usize;
    let mut skipped = 0usize;

    for profile in profiles {
        let Some(source_pk) = profile.id else {
            continue;
        };
        let last_attempt = match ctx.store.latest_attempt_at(source_pk).await {
            Ok(last) => last,
            Err(e) => {
                warn!(source_id = %profile.source_id, error = %e, "Failed to read last attempt");
                continue;
            }
        };

        if !profile.cadence.is_due(last_attempt, now) {
            skipped += 1;
            continue;
        }

        let sender = ctx.queues.fetch_sender(profile.pool);
        Queues::send_or_drop(sender, FetchTask { profile }, "fetch").await;
        dispatched += 1;
    }

    if dispatched > 0 {
        info!(dispatched, skipped, "Scheduler tick dispatched fetches");
    }
}
