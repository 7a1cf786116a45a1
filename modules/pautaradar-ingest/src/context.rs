//! Shared worker context: database, cache, queues, metrics, cancellation.
//! No module-level mutable state anywhere in the pipeline.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use browserless_client::BrowserlessClient;
use pautaradar_common::state::SloPolicy;
use pautaradar_common::Config;
use pautaradar_store::Store;

use crate::cache::EphemeralCache;
use crate::metrics::Metrics;
use crate::queue::Queues;
use crate::yield_monitor::YieldMonitor;

pub struct WorkerContext {
    pub store: Store,
    pub cache: Arc<EphemeralCache>,
    pub queues: Queues,
    pub metrics: Arc<Metrics>,
    pub yield_monitor: YieldMonitor,
    pub browserless: Option<Arc<BrowserlessClient>>,
    pub slo: SloPolicy,
    pub quarantine_ttl_s: u64,
    pub alert_cooldown_s: u64,
    pub cancel: Arc<AtomicBool>,
}

impl WorkerContext {
    pub fn new(config: &Config, store: Store, cache: EphemeralCache, queues: Queues) -> Self {
        let cache = Arc::new(cache);
        let browserless = if config.browserless_url.is_empty() {
            None
        } else {
            Some(Arc::new(BrowserlessClient::new(
                &config.browserless_url,
                config.browserless_token.as_deref(),
            )))
        };
        Self {
            store,
            cache: cache.clone(),
            queues,
            metrics: Arc::new(Metrics::new()),
            yield_monitor: YieldMonitor::new(cache),
            browserless,
            slo: SloPolicy {
                fast_path_s: config.slo_fast_path_s,
                render_path_s: config.slo_render_path_s,
                deep_path_s: config.slo_deep_path_s,
            },
            quarantine_ttl_s: config.quarantine_ttl_s,
            alert_cooldown_s: config.alert_cooldown_s,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}
