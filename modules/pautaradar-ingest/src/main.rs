use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pautaradar_common::Config;
use pautaradar_ingest::cache::EphemeralCache;
use pautaradar_ingest::context::WorkerContext;
use pautaradar_ingest::queue::{build_queues, run_queue_metrics_probe, spawn_pool};
use pautaradar_ingest::{alerts, canonicalize, extractor, fetcher, maintenance, organizer, scheduler, scorer};
use pautaradar_store::Store;

const SCHEDULER_TICK: Duration = Duration::from_secs(60);
const MAINTENANCE_TICK: Duration = Duration::from_secs(30);
const CANONICALIZE_TICK: Duration = Duration::from_secs(120);
const QUEUE_METRICS_TICK: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pautaradar=info".parse()?))
        .init();

    let config = Config::ingest_from_env();
    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;
    let cache = EphemeralCache::connect(&config.redis_url).await;

    let (queues, receivers) = build_queues();
    let ctx = Arc::new(WorkerContext::new(&config, store, cache, queues));

    // Worker pools per queue. I/O-bound, so modest pools go a long way.
    let mut handles = Vec::new();
    handles.extend(spawn_pool("fetch_fast", receivers.fetch_fast, 8, ctx.clone(), fetcher::run_fetch));
    handles.extend(spawn_pool("fetch_render", receivers.fetch_render, 2, ctx.clone(), fetcher::run_fetch));
    handles.extend(spawn_pool("fetch_deep", receivers.fetch_deep, 2, ctx.clone(), fetcher::run_fetch));
    handles.extend(spawn_pool("extract_fast", receivers.extract_fast, 4, ctx.clone(), extractor::run_extraction));
    handles.extend(spawn_pool("extract_deep", receivers.extract_deep, 2, ctx.clone(), extractor::run_extraction));
    handles.extend(spawn_pool("organize", receivers.organize, 4, ctx.clone(), organizer::run_organization));
    handles.extend(spawn_pool("score", receivers.score, 4, ctx.clone(), scorer::run_scoring));
    handles.extend(spawn_pool("alerts", receivers.alerts, 2, ctx.clone(), alerts::run_alerts));

    // Periodic ticks.
    spawn_tick("scheduler", SCHEDULER_TICK, ctx.clone(), |ctx| async move {
        scheduler::orchestrate_fetches(&ctx).await;
    });
    spawn_tick("state_maintenance", MAINTENANCE_TICK, ctx.clone(), |ctx| async move {
        maintenance::run_state_maintenance(&ctx).await;
    });
    spawn_tick("canonicalize", CANONICALIZE_TICK, ctx.clone(), |ctx| async move {
        canonicalize::run_canonicalize(&ctx).await;
    });
    spawn_tick("queue_metrics", QUEUE_METRICS_TICK, ctx.clone(), |ctx| async move {
        run_queue_metrics_probe(&ctx);
    });

    info!("Pautaradar ingest worker started");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; draining workers");
    ctx.cancel.store(true, Ordering::Relaxed);

    Ok(())
}

fn spawn_tick<F, Fut>(name: &'static str, period: Duration, ctx: Arc<WorkerContext>, tick: F)
where
    F: Fn(Arc<WorkerContext>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if ctx.cancel.load(Ordering::Relaxed) {
                info!(tick = name, "Tick loop stopped");
                break;
            }
            tick(ctx.clone()).await;
        }
    });
}
