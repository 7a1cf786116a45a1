use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pautaradar_common::Config;
use pautaradar_ingest::cache::EphemeralCache;
use pautaradar_ingest::queue::{build_queues, spawn_pool};
use pautaradar_ingest::{alerts, scorer, WorkerContext};
use pautaradar_store::Store;

mod cms;
mod feedback;
mod rest;
mod stream;

pub struct AppState {
    pub ctx: Arc<WorkerContext>,
}

impl AppState {
    pub fn store(&self) -> &Store {
        &self.ctx.store
    }
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "ok", "service": "pautaradar"}))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.ctx.metrics.render(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pautaradar=info".parse()?))
        .init();

    let config = Config::web_from_env();
    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;
    let cache = EphemeralCache::connect(&config.redis_url).await;

    // The editorial surface scores and alerts in-process: actions enqueue
    // onto the same typed queues the ingest worker uses, drained here by a
    // small pool. Fetch/extract/organize stay with the ingest binary.
    let (queues, receivers) = build_queues();
    let ctx = Arc::new(WorkerContext::new(&config, store, cache, queues));
    spawn_pool("score", receivers.score, 2, ctx.clone(), scorer::run_scoring);
    spawn_pool("alerts", receivers.alerts, 1, ctx.clone(), alerts::run_alerts);

    let state = Arc::new(AppState { ctx });

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let app = Router::new()
        // Read-only feeds
        .route("/api/events", get(rest::api_events))
        .route("/api/plantao", get(rest::api_plantao))
        .route("/api/oceano-azul", get(rest::api_oceano_azul))
        .route("/api/events/{id}", get(rest::api_event_detail))
        .route("/api/events/{id}/state-history", get(rest::api_state_history))
        .route("/api/events/{id}/merge-audit", get(rest::api_merge_audit))
        .route("/api/events/{id}/feedback", get(rest::api_feedback_list))
        // Editorial actions
        .route("/feedback/{event_id}/action", post(feedback::record_feedback))
        // CMS drafts
        .route("/cms/draft/{event_id}", post(cms::create_cms_draft))
        // Live push
        .route("/events/stream", get(stream::events_stream))
        // Ops
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(cors_origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Pautaradar API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
