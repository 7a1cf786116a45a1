//! Strategy-specific extraction: raw snapshot bytes in, normalized items out.
//!
//! FEED bodies become one item per entry, JSON APIs are walked through the
//! profile's field contract, HTML goes through readability plus metadata
//! selectors, PDFs through text extraction. Zero items is not an error; it
//! is logged and counted and the pipeline moves on.

use std::sync::Arc;
use std::sync::LazyLock;

use base64::Engine;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use pautaradar_common::{ApiContract, SourceProfile, Strategy};

use crate::context::WorkerContext;
use crate::fetcher::{XHR_CAPTURE_END, XHR_CAPTURE_START};
use crate::queue::{DocMeta, ExtractTask, OrganizeTask, PayloadKind, Queues};

/// Upper bound for item text handed to the organizer.
const MAX_ITEM_CHARS: usize = 50_000;
/// Upper bound for raw PDF extraction output.
const MAX_PDF_CHARS: usize = 200_000;

#[derive(Debug, Clone)]
pub struct ExtractedItem {
    pub text: String,
    pub url: String,
    pub title: Option<String>,
    pub content_hash: String,
    pub doc_meta: DocMeta,
}

pub async fn run_extraction(ctx: Arc<WorkerContext>, task: ExtractTask) {
    let profile = task.profile.clone();
    let items = extract_items(&profile, &task.body, &task.content_hash, task.payload_kind, &task.meta);

    if items.is_empty() {
        warn!(
            source_id = %profile.source_id,
            strategy = %profile.strategy,
            "Extraction yielded no items"
        );
        return;
    }

    info!(
        source_id = %profile.source_id,
        items = items.len(),
        "Extraction complete; fanning out to organization"
    );
    ctx.metrics
        .extract_items_total
        .with_label_values(&[&profile.source_id, profile.strategy.as_str()])
        .inc_by(items.len() as u64);

    for item in items {
        let task = OrganizeTask {
            profile: profile.clone(),
            text: item.text,
            content_hash: item.content_hash,
            url: item.url,
            title: item.title,
            doc_meta: item.doc_meta,
        };
        Queues::send_or_drop(&ctx.queues.organize, task, "organize").await;
    }
}

/// Dispatch on strategy and payload kind. Synchronous and deterministic.
pub fn extract_items(
    profile: &SourceProfile,
    body: &str,
    content_hash: &str,
    payload_kind: PayloadKind,
    meta: &crate::queue::FetchMeta,
) -> Vec<ExtractedItem> {
    if profile.strategy == Strategy::Pdf || payload_kind == PayloadKind::PdfBase64 {
        return extract_pdf(profile, body, content_hash, meta);
    }
    match profile.strategy {
        Strategy::Feed => extract_feed(profile, body, meta),
        Strategy::Api | Strategy::SpaApi => {
            let mut items = extract_api_items(profile, body, meta);
            if items.is_empty() {
                // Not every API answers the shape the contract promises;
                // keep the raw body rather than losing the capture.
                if let Some(url) = profile.fetch_url() {
                    items.push(ExtractedItem {
                        text: truncate_chars(body, MAX_ITEM_CHARS),
                        url: url.to_string(),
                        title: None,
                        content_hash: content_hash.to_string(),
                        doc_meta: DocMeta {
                            snapshot_id: meta.snapshot_id,
                            canonical_url: Some(url.to_string()),
                            lang: Some(profile.lang.clone()),
                            ..Default::default()
                        },
                    });
                }
            }
            items
        }
        Strategy::Html | Strategy::SpaHeadless => extract_html(profile, body, content_hash, meta),
        // PDF payloads were dispatched above.
        Strategy::Pdf => Vec::new(),
    }
}

// --- FEED ---

fn extract_feed(profile: &SourceProfile, body: &str, meta: &crate::queue::FetchMeta) -> Vec<ExtractedItem> {
    let feed = match feed_rs::parser::parse(body.as_bytes()) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(source_id = %profile.source_id, error = %e, "Feed parse failed");
            return Vec::new();
        }
    };
    let feed_lang = feed.language.clone();

    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let title = entry.title.as_ref().map(|t| t.content.clone());
            let text = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .or_else(|| {
                    entry.content.as_ref().and_then(|c| c.body.clone())
                })
                .unwrap_or_default();
            let published = entry.published.map(|dt| dt.to_rfc3339());
            let modified = entry.updated.map(|dt| dt.to_rfc3339());
            let author = entry.authors.first().map(|a| a.name.clone());

            Some(ExtractedItem {
                content_hash: item_hash(title.as_deref(), &url, &text),
                text: truncate_chars(&text, MAX_ITEM_CHARS),
                url: url.clone(),
                title,
                doc_meta: DocMeta {
                    snapshot_id: meta.snapshot_id,
                    canonical_url: Some(url),
                    author,
                    lang: feed_lang.clone().or_else(|| Some(profile.lang.clone())),
                    published_at: published,
                    modified_at: modified,
                },
            })
        })
        .filter(|item| !item.text.is_empty() || item.title.is_some())
        .collect()
}

// --- API / SPA_API ---

/// Resolve a dotted path through objects and list indices.
pub fn deep_get<'a>(payload: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = payload;
    for part in path.split('.') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        current = match current {
            serde_json::Value::Object(map) => map.get(part)?,
            serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn pick_first<'a>(
    item: &'a serde_json::Value,
    keys: &[String],
) -> Option<&'a serde_json::Value> {
    let map = item.as_object()?;
    for key in keys {
        if let Some(value) = map.get(key) {
            if !value.is_null() && value.as_str() != Some("") {
                return Some(value);
            }
        }
    }
    None
}

fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn extract_api_items(
    profile: &SourceProfile,
    body: &str,
    meta: &crate::queue::FetchMeta,
) -> Vec<ExtractedItem> {
    let payload: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(source_id = %profile.source_id, error = %e, "API payload is not JSON");
            return Vec::new();
        }
    };

    let default_contract = ApiContract::default();
    let contract = profile.metadata.contract().unwrap_or(&default_contract);

    let items_node = contract
        .items_path
        .as_deref()
        .and_then(|path| deep_get(&payload, path))
        .cloned()
        .or_else(|| match &payload {
            serde_json::Value::Array(_) => Some(payload.clone()),
            serde_json::Value::Object(map) => ["items", "results", "data", "rows"]
                .iter()
                .find_map(|key| map.get(*key).filter(|v| v.is_array()).cloned())
                .or_else(|| Some(serde_json::Value::Array(vec![payload.clone()]))),
            _ => None,
        });
    let items: Vec<serde_json::Value> = match items_node {
        Some(serde_json::Value::Array(list)) => list,
        Some(other) => vec![other],
        None => Vec::new(),
    };

    let text_fields = contract.text_candidates();
    let title_fields = contract.title_candidates();
    let url_fields = contract.url_candidates();
    let canonical_fields = contract.canonical_url_candidates();
    let author_fields = contract.author_candidates();
    let lang_fields = contract.lang_candidates();
    let published_fields = contract.published_candidates();
    let modified_fields = contract.modified_candidates();

    items
        .into_iter()
        .filter_map(|item| {
            let mut chunks: Vec<String> = Vec::new();
            for key in &text_fields {
                let value = if key.contains('.') {
                    deep_get(&item, key)
                } else {
                    item.as_object().and_then(|m| m.get(key.as_str()))
                };
                let Some(value) = value else { continue };
                if value.is_null() {
                    continue;
                }
                match value {
                    serde_json::Value::String(s) if !s.trim().is_empty() => {
                        chunks.push(s.trim().to_string())
                    }
                    serde_json::Value::String(_) => {}
                    other => chunks.push(other.to_string()),
                }
            }
            let mut text = chunks.join("\n\n");
            if text.is_empty() {
                text = truncate_chars(&item.to_string(), MAX_ITEM_CHARS);
            }

            let url = pick_first(&item, &url_fields)
                .and_then(value_to_string)
                .or_else(|| profile.fetch_url().map(str::to_string))?;
            let title = pick_first(&item, &title_fields)
                .and_then(value_to_string)
                .map(|t| truncate_chars(&t, 2000));
            let canonical_url = pick_first(&item, &canonical_fields)
                .and_then(value_to_string)
                .unwrap_or_else(|| url.clone());
            let author = pick_first(&item, &author_fields).and_then(value_to_string);
            let lang = pick_first(&item, &lang_fields)
                .and_then(value_to_string)
                .unwrap_or_else(|| profile.lang.clone());
            let published_at =
                pick_first(&item, &published_fields).and_then(value_to_string).and_then(|v| iso_or_none(&v));
            let modified_at =
                pick_first(&item, &modified_fields).and_then(value_to_string).and_then(|v| iso_or_none(&v));

            Some(ExtractedItem {
                content_hash: item_hash(title.as_deref(), &url, &text),
                text: truncate_chars(&text, MAX_ITEM_CHARS),
                url,
                title,
                doc_meta: DocMeta {
                    snapshot_id: meta.snapshot_id,
                    canonical_url: Some(canonical_url),
                    author,
                    lang: Some(lang),
                    published_at,
                    modified_at,
                },
            })
        })
        .filter(|item| !item.text.is_empty())
        .collect()
}

// --- HTML / SPA_HEADLESS ---

static LANG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("html").expect("valid selector"));
static OG_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static AUTHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[name="author"], meta[property="article:author"]"#)
        .expect("valid selector")
});
static CANONICAL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"link[rel="canonical"]"#).expect("valid selector"));
static PUBLISHED_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"meta[property="article:published_time"], meta[name="pubdate"], meta[name="date"]"#,
    )
    .expect("valid selector")
});
static MODIFIED_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="article:modified_time"], meta[name="lastmod"]"#)
        .expect("valid selector")
});

#[derive(Debug, Default, Clone)]
pub struct HtmlMeta {
    pub lang: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub canonical_url: Option<String>,
    pub published_at: Option<String>,
    pub modified_at: Option<String>,
}

pub fn extract_html_metadata(body: &str) -> HtmlMeta {
    let document = Html::parse_document(body);
    let mut meta = HtmlMeta::default();

    if let Some(html) = document.select(&LANG_SELECTOR).next() {
        meta.lang = html.value().attr("lang").map(|l| truncate_chars(l.trim(), 16));
    }
    meta.title = document
        .select(&OG_TITLE_SELECTOR)
        .next()
        .and_then(|n| n.value().attr("content").map(str::to_string))
        .or_else(|| {
            document
                .select(&TITLE_SELECTOR)
                .next()
                .map(|n| n.text().collect::<String>())
        })
        .map(|t| truncate_chars(t.trim(), 2000))
        .filter(|t| !t.is_empty());
    meta.author = document
        .select(&AUTHOR_SELECTOR)
        .next()
        .and_then(|n| n.value().attr("content").map(str::to_string))
        .map(|a| truncate_chars(a.trim(), 512))
        .filter(|a| !a.is_empty());
    meta.canonical_url = document
        .select(&CANONICAL_SELECTOR)
        .next()
        .and_then(|n| n.value().attr("href").map(str::to_string))
        .map(|u| truncate_chars(u.trim(), 2048))
        .filter(|u| !u.is_empty());
    meta.published_at = document
        .select(&PUBLISHED_SELECTOR)
        .next()
        .and_then(|n| n.value().attr("content"))
        .and_then(iso_or_none);
    meta.modified_at = document
        .select(&MODIFIED_SELECTOR)
        .next()
        .and_then(|n| n.value().attr("content"))
        .and_then(iso_or_none);

    meta
}

/// Readability main-content extraction to markdown.
pub fn html_main_text(body: &str, url: Option<&str>) -> String {
    let parsed_url = url.and_then(|u| url::Url::parse(u).ok());
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: body.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

/// Payload captured between the XHR sentinels during headless rendering.
pub fn extract_xhr_json_blob(body: &str) -> Option<&str> {
    let start = body.find(XHR_CAPTURE_START)? + XHR_CAPTURE_START.len();
    let end = body[start..].find(XHR_CAPTURE_END)? + start;
    let blob = body[start..end].trim();
    (!blob.is_empty()).then_some(blob)
}

fn extract_html(
    profile: &SourceProfile,
    body: &str,
    content_hash: &str,
    meta: &crate::queue::FetchMeta,
) -> Vec<ExtractedItem> {
    let html_meta = extract_html_metadata(body);
    let item_url = html_meta
        .canonical_url
        .clone()
        .or_else(|| profile.fetch_url().map(str::to_string));
    let Some(item_url) = item_url else {
        return Vec::new();
    };

    let mut text = html_main_text(body, Some(&item_url));
    if text.trim().is_empty() && profile.strategy == Strategy::SpaHeadless {
        if let Some(blob) = extract_xhr_json_blob(body) {
            text = truncate_chars(blob, MAX_ITEM_CHARS);
        }
    }
    if text.trim().is_empty() {
        return Vec::new();
    }

    vec![ExtractedItem {
        text: truncate_chars(&text, MAX_ITEM_CHARS),
        url: item_url.clone(),
        title: html_meta.title.clone(),
        content_hash: content_hash.to_string(),
        doc_meta: DocMeta {
            snapshot_id: meta.snapshot_id,
            canonical_url: Some(html_meta.canonical_url.unwrap_or(item_url)),
            author: html_meta.author,
            lang: html_meta.lang.or_else(|| Some(profile.lang.clone())),
            published_at: html_meta.published_at,
            modified_at: html_meta.modified_at,
        },
    }]
}

// --- PDF ---

/// Best-effort PDF text extraction. An image-only PDF yields no text and is
/// reported as OCR-unavailable rather than failing the task.
pub fn extract_pdf_content(pdf_bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                warn!("PDF has no extractable text layer (OCRUnavailable)");
                return None;
            }
            Some(truncate_chars(trimmed, MAX_PDF_CHARS))
        }
        Err(e) => {
            warn!(error = %e, "PDF parse failed (PDFParse)");
            None
        }
    }
}

fn extract_pdf(
    profile: &SourceProfile,
    body: &str,
    content_hash: &str,
    meta: &crate::queue::FetchMeta,
) -> Vec<ExtractedItem> {
    let bytes = match base64::engine::general_purpose::STANDARD.decode(body.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(source_id = %profile.source_id, error = %e, "PDF payload is not valid base64");
            return Vec::new();
        }
    };
    let Some(text) = extract_pdf_content(&bytes) else {
        return Vec::new();
    };
    let Some(url) = profile.fetch_url().map(str::to_string) else {
        return Vec::new();
    };

    vec![ExtractedItem {
        text: truncate_chars(&text, MAX_ITEM_CHARS),
        url: url.clone(),
        title: None,
        content_hash: content_hash.to_string(),
        doc_meta: DocMeta {
            snapshot_id: meta.snapshot_id,
            canonical_url: Some(url),
            lang: Some(profile.lang.clone()),
            ..Default::default()
        },
    }]
}

// --- shared helpers ---

pub fn item_hash(title: Option<&str>, url: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Parse a permissive timestamp into RFC 3339, or drop it.
pub fn iso_or_none(value: &str) -> Option<String> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text.replace("Z", "+00:00")) {
        return Some(dt.with_timezone(&Utc).to_rfc3339());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc).to_rfc3339());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc().to_rfc3339());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc().to_rfc3339());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().to_rfc3339());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FetchMeta;
    use serde_json::json;

    fn api_profile(contract: serde_json::Value) -> SourceProfile {
        SourceProfile::from_value(json!({
            "source_id": "api_src",
            "tier": 2,
            "pool": "FAST",
            "strategy": "API",
            "endpoints": {"api": "https://example.org/api/news"},
            "cadence": {"interval_seconds": 300},
            "metadata": {"api_contract": contract}
        }))
        .unwrap()
    }

    #[test]
    fn deep_get_walks_objects_and_lists() {
        let payload = json!({"data": {"items": [{"title": "a"}, {"title": "b"}]}});
        assert_eq!(deep_get(&payload, "data.items.1.title"), Some(&json!("b")));
        assert_eq!(deep_get(&payload, "data.missing"), None);
        assert_eq!(deep_get(&payload, "data.items.9"), None);
    }

    #[test]
    fn api_items_follow_the_contract() {
        let profile = api_profile(json!({
            "items_path": "data.rows",
            "text_fields": ["ementa", "resumo"],
            "title_field": "titulo",
            "url_fields": ["link"]
        }));
        let body = json!({
            "data": {"rows": [
                {"titulo": "PL em pauta", "ementa": "Texto da ementa", "resumo": "Resumo",
                 "link": "https://example.org/pl/1", "published_at": "2025-03-05T12:00:00Z"}
            ]}
        })
        .to_string();

        let items = extract_api_items(&profile, &body, &FetchMeta::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("PL em pauta"));
        assert_eq!(items[0].url, "https://example.org/pl/1");
        assert!(items[0].text.contains("Texto da ementa"));
        assert!(items[0].text.contains("Resumo"));
        assert!(items[0].doc_meta.published_at.as_deref().unwrap().starts_with("2025-03-05"));
    }

    #[test]
    fn api_items_fall_back_to_conventional_list_keys() {
        let profile = api_profile(json!({}));
        let body = json!({"results": [
            {"title": "Nota", "content": "Conteúdo da nota", "url": "https://example.org/n/1"}
        ]})
        .to_string();
        let items = extract_api_items(&profile, &body, &FetchMeta::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.org/n/1");
    }

    #[test]
    fn api_root_object_becomes_single_item() {
        let profile = api_profile(json!({}));
        let body = json!({"title": "Aviso", "content": "Corpo"}).to_string();
        let items = extract_api_items(&profile, &body, &FetchMeta::default());
        assert_eq!(items.len(), 1);
        // No URL field: falls back to the profile endpoint.
        assert_eq!(items[0].url, "https://example.org/api/news");
    }

    #[test]
    fn feed_entries_become_items() {
        let profile = SourceProfile::from_value(json!({
            "source_id": "feed_src",
            "tier": 1,
            "pool": "FAST",
            "strategy": "FEED",
            "endpoints": {"feed": "https://example.org/rss"},
            "cadence": {"interval_seconds": 300}
        }))
        .unwrap();
        let body = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel>
              <title>Notícias</title>
              <item>
                <title>CGU abre investigação</title>
                <link>https://exemplo.gov.br/n1</link>
                <description>Investigação sobre CNPJ 12.345.678/0001-99</description>
                <pubDate>Wed, 05 Mar 2025 12:00:00 GMT</pubDate>
              </item>
            </channel></rss>"#;

        let items = extract_feed(&profile, body, &FetchMeta::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://exemplo.gov.br/n1");
        assert_eq!(items[0].title.as_deref(), Some("CGU abre investigação"));
        assert!(items[0].text.contains("CNPJ"));
        assert!(items[0].doc_meta.published_at.is_some());
    }

    #[test]
    fn html_metadata_selectors() {
        let body = r#"<html lang="pt-BR"><head>
            <meta property="og:title" content="Título OG" />
            <meta name="author" content="Redação" />
            <link rel="canonical" href="https://example.org/materia" />
            <meta property="article:published_time" content="2025-03-05T12:00:00Z" />
            </head><body><p>corpo</p></body></html>"#;
        let meta = extract_html_metadata(body);
        assert_eq!(meta.lang.as_deref(), Some("pt-BR"));
        assert_eq!(meta.title.as_deref(), Some("Título OG"));
        assert_eq!(meta.author.as_deref(), Some("Redação"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.org/materia"));
        assert!(meta.published_at.as_deref().unwrap().starts_with("2025-03-05"));
    }

    #[test]
    fn xhr_blob_between_sentinels() {
        let body = format!(
            "<html></html>\n{XHR_CAPTURE_START}\n{{\"items\":[1,2]}}\n{XHR_CAPTURE_END}\n"
        );
        assert_eq!(extract_xhr_json_blob(&body), Some("{\"items\":[1,2]}"));
        assert_eq!(extract_xhr_json_blob("<html></html>"), None);
    }

    #[test]
    fn item_hash_is_stable_and_input_sensitive() {
        let a = item_hash(Some("t"), "https://u", "texto");
        assert_eq!(a, item_hash(Some("t"), "https://u", "texto"));
        assert_ne!(a, item_hash(Some("t"), "https://u", "outro"));
        assert_ne!(a, item_hash(None, "https://u", "texto"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "ação".repeat(20_000);
        let truncated = truncate_chars(&text, MAX_ITEM_CHARS);
        assert_eq!(truncated.chars().count(), MAX_ITEM_CHARS);
    }

    #[test]
    fn iso_or_none_accepts_common_shapes() {
        assert!(iso_or_none("2025-03-05T12:00:00Z").is_some());
        assert!(iso_or_none("Wed, 05 Mar 2025 12:00:00 GMT").is_some());
        assert!(iso_or_none("2025-03-05 12:00:00").is_some());
        assert!(iso_or_none("2025-03-05").is_some());
        assert!(iso_or_none("amanhã").is_none());
        assert!(iso_or_none("").is_none());
    }

    #[test]
    fn garbage_pdf_yields_nothing() {
        assert!(extract_pdf_content(b"not a pdf").is_none());
    }
}
