//! Typed in-process queues and worker pools.
//!
//! Each queue is a bounded mpsc channel consumed by a small pool of tokio
//! tasks. Fetch work routes by the profile's pool, extraction by payload
//! depth. Backlog per queue is observable through the channel capacity.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use pautaradar_common::{Pool, SourceProfile, Strategy};

use crate::context::WorkerContext;

const QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FetchTask {
    pub profile: SourceProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    PdfBase64,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FetchMeta {
    pub snapshot_id: Option<i64>,
    pub response_headers: serde_json::Value,
    pub status_code: u16,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractTask {
    pub profile: SourceProfile,
    pub body: String,
    pub content_hash: String,
    pub payload_kind: PayloadKind,
    pub meta: FetchMeta,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DocMeta {
    pub snapshot_id: Option<i64>,
    pub canonical_url: Option<String>,
    pub author: Option<String>,
    pub lang: Option<String>,
    pub published_at: Option<String>,
    pub modified_at: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OrganizeTask {
    pub profile: SourceProfile,
    pub text: String,
    pub content_hash: String,
    pub url: String,
    pub title: Option<String>,
    pub doc_meta: DocMeta,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ScoreTask {
    pub event_id: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AlertTask {
    pub event_id: i64,
    pub plantao: serde_json::Value,
    pub oceano: serde_json::Value,
}

/// Send side of every queue, cloned into the worker context.
#[derive(Clone)]
pub struct Queues {
    pub fetch_fast: mpsc::Sender<FetchTask>,
    pub fetch_render: mpsc::Sender<FetchTask>,
    pub fetch_deep: mpsc::Sender<FetchTask>,
    pub extract_fast: mpsc::Sender<ExtractTask>,
    pub extract_deep: mpsc::Sender<ExtractTask>,
    pub organize: mpsc::Sender<OrganizeTask>,
    pub score: mpsc::Sender<ScoreTask>,
    pub alerts: mpsc::Sender<AlertTask>,
}

/// Receive side, consumed once by the worker pools at startup.
pub struct QueueReceivers {
    pub fetch_fast: mpsc::Receiver<FetchTask>,
    pub fetch_render: mpsc::Receiver<FetchTask>,
    pub fetch_deep: mpsc::Receiver<FetchTask>,
    pub extract_fast: mpsc::Receiver<ExtractTask>,
    pub extract_deep: mpsc::Receiver<ExtractTask>,
    pub organize: mpsc::Receiver<OrganizeTask>,
    pub score: mpsc::Receiver<ScoreTask>,
    pub alerts: mpsc::Receiver<AlertTask>,
}

pub fn build_queues() -> (Queues, QueueReceivers) {
    let (fetch_fast_tx, fetch_fast_rx) = mpsc::channel(QUEUE_DEPTH);
    let (fetch_render_tx, fetch_render_rx) = mpsc::channel(QUEUE_DEPTH);
    let (fetch_deep_tx, fetch_deep_rx) = mpsc::channel(QUEUE_DEPTH);
    let (extract_fast_tx, extract_fast_rx) = mpsc::channel(QUEUE_DEPTH);
    let (extract_deep_tx, extract_deep_rx) = mpsc::channel(QUEUE_DEPTH);
    let (organize_tx, organize_rx) = mpsc::channel(QUEUE_DEPTH);
    let (score_tx, score_rx) = mpsc::channel(QUEUE_DEPTH);
    let (alerts_tx, alerts_rx) = mpsc::channel(QUEUE_DEPTH);

    (
        Queues {
            fetch_fast: fetch_fast_tx,
            fetch_render: fetch_render_tx,
            fetch_deep: fetch_deep_tx,
            extract_fast: extract_fast_tx,
            extract_deep: extract_deep_tx,
            organize: organize_tx,
            score: score_tx,
            alerts: alerts_tx,
        },
        QueueReceivers {
            fetch_fast: fetch_fast_rx,
            fetch_render: fetch_render_rx,
            fetch_deep: fetch_deep_rx,
            extract_fast: extract_fast_rx,
            extract_deep: extract_deep_rx,
            organize: organize_rx,
            score: score_rx,
            alerts: alerts_rx,
        },
    )
}

impl Queues {
    /// Fetch queue for a profile, routed by its pool.
    pub fn fetch_sender(&self, pool: Pool) -> &mpsc::Sender<FetchTask> {
        match pool {
            Pool::Fast => &self.fetch_fast,
            Pool::HeavyRender => &self.fetch_render,
            Pool::DeepExtract => &self.fetch_deep,
        }
    }

    /// Extract queue: deep for PDF and deep-extract sources, fast otherwise.
    pub fn extract_sender(&self, profile: &SourceProfile) -> &mpsc::Sender<ExtractTask> {
        if profile.pool == Pool::DeepExtract || profile.strategy == Strategy::Pdf {
            &self.extract_deep
        } else {
            &self.extract_fast
        }
    }

    /// Best-effort enqueue. A full queue drops the task with a warning; the
    /// next scheduler tick or rescore catches up.
    pub async fn send_or_drop<T: Send + 'static>(sender: &mpsc::Sender<T>, task: T, queue: &str) {
        if let Err(e) = sender.try_send(task) {
            warn!(queue, error = %e, "Queue full or closed; dropping task");
        }
    }

    /// Estimated backlog per queue, from channel capacity.
    pub fn backlog(&self) -> Vec<(&'static str, usize)> {
        fn depth<T>(sender: &mpsc::Sender<T>) -> usize {
            sender.max_capacity().saturating_sub(sender.capacity())
        }
        vec![
            ("fetch_fast", depth(&self.fetch_fast)),
            ("fetch_render", depth(&self.fetch_render)),
            ("fetch_deep", depth(&self.fetch_deep)),
            ("extract_fast", depth(&self.extract_fast)),
            ("extract_deep", depth(&self.extract_deep)),
            ("organize", depth(&self.organize)),
            ("score", depth(&self.score)),
            ("alerts", depth(&self.alerts)),
        ]
    }
}

/// Spawn `workers` tasks all draining one receiver. Workers stop when the
/// channel closes or the context is cancelled.
pub fn spawn_pool<T, F, Fut>(
    name: &'static str,
    rx: mpsc::Receiver<T>,
    workers: usize,
    ctx: Arc<WorkerContext>,
    handler: F,
) -> Vec<JoinHandle<()>>
where
    T: Send + 'static,
    F: Fn(Arc<WorkerContext>, T) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let rx = Arc::new(Mutex::new(rx));
    (0..workers)
        .map(|worker| {
            let rx = rx.clone();
            let ctx = ctx.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                loop {
                    if ctx.cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let task = {
                        let mut guard = rx.lock().await;
                        guard.recv().await
                    };
                    match task {
                        Some(task) => handler(ctx.clone(), task).await,
                        None => break,
                    }
                }
                info!(pool = name, worker, "Worker stopped");
            })
        })
        .collect()
}

/// Periodic queue-depth export to the backlog gauge.
pub fn run_queue_metrics_probe(ctx: &WorkerContext) {
    for (queue, depth) in ctx.queues.backlog() {
        ctx.metrics.queue_backlog.with_label_values(&[queue]).set(depth as i64);
    }
}
