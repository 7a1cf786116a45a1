//! Strategy-aware fetcher.
//!
//! One task = one source, one URL. The pipeline is: URL selection, SSRF
//! guard, preflight limits (circuit breaker, per-minute rate, per-domain
//! concurrency), conditional request, strategy execution, size enforcement,
//! snapshot persistence, extract fan-out. Every task appends exactly one
//! FetchAttempt with its final outcome; the fetcher never panics the worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use browserless_client::RenderOptions;
use pautaradar_common::{ErrorClass, SourceProfile, Strategy};
use pautaradar_store::snapshots::NewAttempt;

use crate::context::WorkerContext;
use crate::guard;
use crate::limits::Limiter;
use crate::queue::{ExtractTask, FetchMeta, FetchTask, PayloadKind, Queues};

/// Sentinel markers wrapping captured XHR JSON inside a rendered body.
pub const XHR_CAPTURE_START: &str = "<!-- XHR_JSON_CAPTURE_START -->";
pub const XHR_CAPTURE_END: &str = "<!-- XHR_JSON_CAPTURE_END -->";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(60);

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// `snapshot_hash = SHA-256(url || content_hash)`.
pub fn snapshot_hash(url: &str, content_hash: &str) -> String {
    sha256_hex(format!("{url}{content_hash}").as_bytes())
}

enum Body {
    Text(String),
    Pdf(Vec<u8>),
}

struct HttpSuccess {
    status_code: u16,
    body: Body,
    response_headers: serde_json::Value,
    not_modified: bool,
}

pub async fn run_fetch(ctx: Arc<WorkerContext>, task: FetchTask) {
    let profile = task.profile;
    let strategy = profile.strategy.as_str();
    let pool = profile.pool.as_str();

    let Some(source_pk) = profile.id else {
        warn!(source_id = %profile.source_id, "Fetch aborted: profile has no catalog id");
        ctx.metrics
            .fetch_attempts_total
            .with_label_values(&[&profile.source_id, strategy, pool, "0xx", ErrorClass::MissingSourceId.as_str()])
            .inc();
        return;
    };

    let Some(url) = profile.fetch_url().map(str::to_string) else {
        warn!(source_id = %profile.source_id, "Fetch aborted: no endpoint for strategy");
        ctx.metrics
            .fetch_attempts_total
            .with_label_values(&[&profile.source_id, strategy, pool, "0xx", ErrorClass::MissingEndpoint.as_str()])
            .inc();
        return;
    };

    // SSRF guard: refused URLs leave no trace beyond the metric.
    if !guard::check_url(&url).await {
        ctx.metrics
            .fetch_attempts_total
            .with_label_values(&[&profile.source_id, strategy, pool, "0xx", "SSRFBlocked"])
            .inc();
        return;
    }

    let limiter = Limiter::new(&ctx.cache);

    let preflight_block = if limiter.breaker_open(source_pk).await {
        Some(ErrorClass::CircuitOpen)
    } else if !limiter
        .check_rate(source_pk, profile.limits.rate_per_min, Utc::now().timestamp())
        .await
    {
        Some(ErrorClass::RateLimited)
    } else {
        None
    };
    if let Some(blocked) = preflight_block {
        record_outcome(&ctx, &profile, source_pk, &url, 0, Some(blocked), 0, 0, None).await;
        return;
    }

    let domain = url::Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    if !limiter
        .acquire_domain(&domain, profile.limits.domain_concurrency, profile.limits.timeout_s)
        .await
    {
        record_outcome(
            &ctx,
            &profile,
            source_pk,
            &url,
            0,
            Some(ErrorClass::DomainConcurrencyLimited),
            0,
            0,
            None,
        )
        .await;
        return;
    }

    // The domain slot is held for the whole execution and always released.
    let started = Instant::now();
    let result = execute_with_retries(&ctx, &profile, &url).await;
    limiter.release_domain(&domain).await;
    let latency_ms = started.elapsed().as_millis() as i32;

    ctx.metrics
        .fetch_latency_seconds
        .with_label_values(&[strategy, pool])
        .observe(started.elapsed().as_secs_f64());

    match result {
        Err(error_class) => {
            limiter.record_failure(source_pk).await;
            record_outcome(
                &ctx,
                &profile,
                source_pk,
                &url,
                0,
                Some(error_class),
                latency_ms,
                0,
                None,
            )
            .await;
        }
        Ok(success) if success.not_modified => {
            limiter.record_success(source_pk).await;
            record_outcome(&ctx, &profile, source_pk, &url, 304, None, latency_ms, 0, None).await;
        }
        Ok(success) => {
            limiter.record_success(source_pk).await;
            persist_success(ctx.clone(), &profile, source_pk, &url, success, latency_ms).await;
        }
    }
}

async fn execute_with_retries(
    ctx: &WorkerContext,
    profile: &SourceProfile,
    url: &str,
) -> Result<HttpSuccess, ErrorClass> {
    let conditional = conditional_headers(ctx, url).await;
    let mut last_error = ErrorClass::ConnectError;
    for attempt in 1..=MAX_ATTEMPTS {
        let result = match profile.strategy {
            Strategy::SpaHeadless => execute_headless(ctx, profile, url).await,
            Strategy::Pdf => execute_pdf(profile, url, &conditional).await,
            _ => execute_http(profile, url, &conditional).await,
        };
        match result {
            Ok(success) => return Ok(success),
            Err(error_class) => {
                last_error = error_class;
                if !is_retryable(error_class) || attempt == MAX_ATTEMPTS {
                    return Err(error_class);
                }
                warn!(
                    source_id = %profile.source_id,
                    url,
                    attempt,
                    error_class = error_class.as_str(),
                    "Fetch failed; backing off"
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
    Err(last_error)
}

fn is_retryable(error_class: ErrorClass) -> bool {
    matches!(
        error_class,
        ErrorClass::Timeout | ErrorClass::ConnectError | ErrorClass::Dns | ErrorClass::TlsError
    )
}

/// `If-None-Match` / `If-Modified-Since` from the most recent snapshot.
async fn conditional_headers(ctx: &WorkerContext, url: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Ok(Some(snapshot)) = ctx.store.latest_snapshot(url).await {
        if let Some(stored) = snapshot.response_headers.as_ref().and_then(|h| h.as_object()) {
            if let Some(etag) = stored.get("etag").and_then(|v| v.as_str()) {
                headers.insert("If-None-Match".to_string(), etag.to_string());
            }
            if let Some(modified) = stored.get("last-modified").and_then(|v| v.as_str()) {
                headers.insert("If-Modified-Since".to_string(), modified.to_string());
            }
        }
    }
    headers
}

fn classify_reqwest_error(e: &reqwest::Error) -> ErrorClass {
    if e.is_timeout() {
        return ErrorClass::Timeout;
    }
    let text = e.to_string().to_lowercase();
    if text.contains("dns") || text.contains("resolve") {
        return ErrorClass::Dns;
    }
    if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
        return ErrorClass::TlsError;
    }
    if e.is_connect() {
        return ErrorClass::ConnectError;
    }
    if e.is_status() {
        return ErrorClass::HttpStatusError;
    }
    ErrorClass::ConnectError
}

fn build_header_map(pairs: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in pairs {
        let Ok(name) = key.parse::<HeaderName>() else {
            continue;
        };
        let Ok(value) = HeaderValue::from_str(value) else {
            continue;
        };
        headers.insert(name, value);
    }
    headers
}

fn response_headers_json(headers: &HeaderMap) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        if let Ok(text) = value.to_str() {
            map.insert(name.as_str().to_lowercase(), serde_json::json!(text));
        }
    }
    serde_json::Value::Object(map)
}

async fn execute_http(
    profile: &SourceProfile,
    url: &str,
    conditional: &HashMap<String, String>,
) -> Result<HttpSuccess, ErrorClass> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(profile.limits.timeout_s))
        .default_headers(build_header_map(&profile.headers))
        .build()
        .map_err(|e| classify_reqwest_error(&e))?;

    let spa_request = profile.metadata.spa_api_request.as_ref();
    let method_is_post = spa_request
        .and_then(|r| r.method.as_deref())
        .map(|m| m.eq_ignore_ascii_case("POST"))
        .unwrap_or(false);
    let target = spa_request.and_then(|r| r.url.as_deref()).unwrap_or(url);
    if target != url && !guard::check_url(target).await {
        return Err(ErrorClass::ConnectError);
    }

    let mut request = if method_is_post { client.post(target) } else { client.get(target) };
    if let Some(spa) = spa_request {
        if let Some(extra) = &spa.headers {
            request = request.headers(build_header_map(extra));
        }
        if let Some(params) = &spa.params {
            request = request.query(&params.iter().collect::<Vec<_>>());
        }
        if method_is_post {
            if let Some(json) = &spa.json {
                request = request.json(json);
            } else if let Some(data) = &spa.data {
                request = request.body(data.clone());
            }
        }
    }
    for (key, value) in conditional {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| classify_reqwest_error(&e))?;
    let status = response.status();
    let response_headers = response_headers_json(response.headers());

    if status.as_u16() == 304 {
        return Ok(HttpSuccess {
            status_code: 304,
            body: Body::Text(String::new()),
            response_headers,
            not_modified: true,
        });
    }
    if !status.is_success() {
        return Err(ErrorClass::HttpStatusError);
    }
    if let Some(length) = response.content_length() {
        if length > profile.limits.max_bytes {
            return Err(ErrorClass::MaxBytesExceeded);
        }
    }

    let body = response.text().await.map_err(|e| classify_reqwest_error(&e))?;
    if body.len() as u64 > profile.limits.max_bytes {
        return Err(ErrorClass::MaxBytesExceeded);
    }

    Ok(HttpSuccess {
        status_code: status.as_u16(),
        body: Body::Text(body),
        response_headers,
        not_modified: false,
    })
}

async fn execute_pdf(
    profile: &SourceProfile,
    url: &str,
    conditional: &HashMap<String, String>,
) -> Result<HttpSuccess, ErrorClass> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(profile.limits.timeout_s))
        .default_headers(build_header_map(&profile.headers))
        .build()
        .map_err(|e| classify_reqwest_error(&e))?;

    let mut request = client.get(url);
    for (key, value) in conditional {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| classify_reqwest_error(&e))?;
    let status = response.status();
    let response_headers = response_headers_json(response.headers());

    if status.as_u16() == 304 {
        return Ok(HttpSuccess {
            status_code: 304,
            body: Body::Pdf(Vec::new()),
            response_headers,
            not_modified: true,
        });
    }
    if !status.is_success() {
        return Err(ErrorClass::HttpStatusError);
    }
    if let Some(length) = response.content_length() {
        if length > profile.limits.max_bytes {
            return Err(ErrorClass::MaxBytesExceeded);
        }
    }

    let bytes = response.bytes().await.map_err(|e| classify_reqwest_error(&e))?;
    if bytes.len() as u64 > profile.limits.max_bytes {
        return Err(ErrorClass::MaxBytesExceeded);
    }

    Ok(HttpSuccess {
        status_code: status.as_u16(),
        body: Body::Pdf(bytes.to_vec()),
        response_headers,
        not_modified: false,
    })
}

async fn execute_headless(
    ctx: &WorkerContext,
    profile: &SourceProfile,
    url: &str,
) -> Result<HttpSuccess, ErrorClass> {
    let Some(browserless) = &ctx.browserless else {
        warn!(source_id = %profile.source_id, "SPA_HEADLESS profile without a browserless endpoint");
        return Err(ErrorClass::ConnectError);
    };

    let capture = profile.metadata.headless_capture.clone().unwrap_or_default();
    let options = RenderOptions {
        user_agent: Some(
            profile
                .headers
                .get("User-Agent")
                .cloned()
                .unwrap_or_else(|| "PautaradarBot/1.0 (institucional)".to_string()),
        ),
        block_assets: true,
        capture_url_contains: capture
            .url_contains
            .as_ref()
            .map(|patterns| patterns.as_vec())
            .unwrap_or_default(),
        max_captures: capture.max_captures,
        max_capture_bytes: capture.max_capture_bytes,
        timeout: Duration::from_secs(profile.limits.timeout_s),
    };

    let rendered = browserless.render(url, &options).await.map_err(|e| {
        warn!(url, error = %e, "Headless render failed");
        match e {
            browserless_client::BrowserlessError::Api { .. } => ErrorClass::HttpStatusError,
            _ => ErrorClass::ConnectError,
        }
    })?;

    let mut body = rendered.html;
    if !rendered.captures.is_empty() {
        let blob = rendered
            .captures
            .iter()
            .map(|c| c.body.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        body.push_str(&format!("\n{XHR_CAPTURE_START}\n{blob}\n{XHR_CAPTURE_END}\n"));
    }
    if body.len() as u64 > profile.limits.max_bytes {
        return Err(ErrorClass::MaxBytesExceeded);
    }

    Ok(HttpSuccess {
        status_code: 200,
        body: Body::Text(body),
        response_headers: serde_json::json!({}),
        not_modified: false,
    })
}

#[allow(clippy::too_many_arguments)]
async fn record_outcome(
    ctx: &WorkerContext,
    profile: &SourceProfile,
    source_pk: i64,
    url: &str,
    status_code: i32,
    error_class: Option<ErrorClass>,
    latency_ms: i32,
    bytes: i64,
    snapshot_hash: Option<String>,
) {
    let status_class = match status_code {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "0xx",
    };
    ctx.metrics
        .fetch_attempts_total
        .with_label_values(&[
            &profile.source_id,
            profile.strategy.as_str(),
            profile.pool.as_str(),
            status_class,
            error_class.map(|e| e.as_str()).unwrap_or("none"),
        ])
        .inc();

    ctx.store
        .record_attempt(NewAttempt {
            source_pk: Some(source_pk),
            url: url.to_string(),
            status_code,
            error_class: error_class.map(|e| e.as_str().to_string()),
            latency_ms,
            bytes,
            pool: profile.pool.as_str().to_string(),
            snapshot_hash,
        })
        .await;
}

async fn persist_success(
    ctx: Arc<WorkerContext>,
    profile: &SourceProfile,
    source_pk: i64,
    url: &str,
    success: HttpSuccess,
    latency_ms: i32,
) {
    let (payload_kind, transport_body, content_hash, bytes) = match &success.body {
        Body::Text(text) => (
            PayloadKind::Text,
            text.clone(),
            sha256_hex(text.as_bytes()),
            text.len() as i64,
        ),
        Body::Pdf(raw) => (
            PayloadKind::PdfBase64,
            base64::engine::general_purpose::STANDARD.encode(raw),
            sha256_hex(raw),
            raw.len() as i64,
        ),
    };
    let snap_hash = snapshot_hash(url, &content_hash);

    let previous = ctx.store.latest_snapshot(url).await.ok().flatten();
    let unchanged = previous.as_ref().is_some_and(|p| p.content_hash == content_hash);

    record_outcome(
        &ctx,
        profile,
        source_pk,
        url,
        success.status_code as i32,
        None,
        latency_ms,
        bytes,
        Some(snap_hash.clone()),
    )
    .await;

    if unchanged {
        info!(source_id = %profile.source_id, url, "Content unchanged; no new snapshot");
        return;
    }

    let snapshot_id = match ctx
        .store
        .insert_snapshot(url, &success.response_headers, &transport_body, &content_hash, &snap_hash)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(url, error = %e, "Failed to persist snapshot");
            return;
        }
    };

    let task = ExtractTask {
        profile: profile.clone(),
        body: transport_body,
        content_hash,
        payload_kind,
        meta: FetchMeta {
            snapshot_id: Some(snapshot_id),
            response_headers: success.response_headers,
            status_code: success.status_code,
        },
    };
    Queues::send_or_drop(ctx.queues.extract_sender(profile), task, "extract").await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_hash_is_url_bound() {
        let a = snapshot_hash("https://a.example/x", "abc");
        let b = snapshot_hash("https://b.example/x", "abc");
        assert_ne!(a, b);
        assert_eq!(a, snapshot_hash("https://a.example/x", "abc"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn retryable_classes() {
        assert!(is_retryable(ErrorClass::Timeout));
        assert!(is_retryable(ErrorClass::Dns));
        assert!(!is_retryable(ErrorClass::MaxBytesExceeded));
        assert!(!is_retryable(ErrorClass::HttpStatusError));
        assert!(!is_retryable(ErrorClass::RateLimited));
    }

    #[test]
    fn header_map_skips_invalid_entries() {
        let mut pairs = HashMap::new();
        pairs.insert("User-Agent".to_string(), "radar/1.0".to_string());
        pairs.insert("Bad Header Name!!\n".to_string(), "x".to_string());
        let map = build_header_map(&pairs);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("user-agent").unwrap(), "radar/1.0");
    }
}
