//! Source profile DSL.
//!
//! A profile is the validated configuration of one crawler: strategy,
//! endpoints, cadence, limits, observability window, and strategy-specific
//! metadata contracts. Profiles are stored as JSON on the source catalog row
//! and validated on read; a row with an invalid profile aborts bootstrap with
//! a precise error.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RadarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    Feed,
    Html,
    Api,
    SpaApi,
    SpaHeadless,
    Pdf,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "FEED",
            Self::Html => "HTML",
            Self::Api => "API",
            Self::SpaApi => "SPA_API",
            Self::SpaHeadless => "SPA_HEADLESS",
            Self::Pdf => "PDF",
        }
    }

    /// Endpoint keys tried in order when selecting the fetch URL.
    pub fn endpoint_priority(&self) -> &'static [&'static str] {
        match self {
            Self::Feed | Self::Html | Self::SpaHeadless => &["feed", "latest", "api"],
            Self::Api | Self::SpaApi => &["api", "latest", "feed"],
            Self::Pdf => &["latest", "feed", "api"],
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pool {
    Fast,
    HeavyRender,
    DeepExtract,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "FAST",
            Self::HeavyRender => "HEAVY_RENDER",
            Self::DeepExtract => "DEEP_EXTRACT",
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pool {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FAST" => Ok(Self::Fast),
            "HEAVY_RENDER" => Ok(Self::HeavyRender),
            "DEEP_EXTRACT" => Ok(Self::DeepExtract),
            other => Err(format!("unknown Pool: {other}")),
        }
    }
}

/// Either a fixed interval or a 5-field cron expression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cadence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
}

impl Cadence {
    /// Whether a fetch is due, given the timestamp of the last attempt.
    ///
    /// Interval cadence: due once `now - last >= interval`. Cron cadence: due
    /// once the first scheduled instant after the reference point has passed.
    /// A source never attempted uses `now - 1d` as the cron reference.
    pub fn is_due(&self, last_attempt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if let Some(interval) = self.interval_seconds {
            return match last_attempt {
                Some(last) => (now - last).num_seconds() >= interval as i64,
                None => true,
            };
        }
        if let Some(expr) = &self.cron {
            let Ok(schedule) = parse_cron(expr) else {
                return false;
            };
            let reference = last_attempt.unwrap_or_else(|| now - Duration::days(1));
            return schedule.after(&reference).next().is_some_and(|next| next <= now);
        }
        false
    }

    fn validate(&self) -> Result<(), String> {
        match (self.interval_seconds, &self.cron) {
            (None, None) => Err("cadence must define interval_seconds or cron".into()),
            (Some(_), Some(_)) => {
                Err("cadence must define exactly one of interval_seconds or cron".into())
            }
            (Some(0), None) => Err("cadence.interval_seconds must be positive".into()),
            (Some(_), None) => Ok(()),
            (None, Some(expr)) => {
                if expr.split_whitespace().count() != 5 {
                    return Err("cadence.cron must have 5 fields".into());
                }
                parse_cron(expr).map(|_| ()).map_err(|e| format!("cadence.cron invalid: {e}"))
            }
        }
    }
}

/// The `cron` crate wants a seconds field; catalog cadences are 5-field.
fn parse_cron(expr: &str) -> Result<cron::Schedule, cron::error::Error> {
    cron::Schedule::from_str(&format!("0 {expr}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_rate_per_min")]
    pub rate_per_min: u32,
    #[serde(default = "default_domain_concurrency")]
    pub domain_concurrency: u32,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            rate_per_min: default_rate_per_min(),
            domain_concurrency: default_domain_concurrency(),
            timeout_s: default_timeout_s(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_rate_per_min() -> u32 {
    10
}
fn default_domain_concurrency() -> u32 {
    1
}
fn default_timeout_s() -> u64 {
    30
}
fn default_max_bytes() -> u64 {
    5_000_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observability {
    #[serde(default = "default_window_h")]
    pub window_h: u32,
    #[serde(default = "default_baseline_rolling")]
    pub baseline_rolling: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_profile: Option<String>,
}

impl Default for Observability {
    fn default() -> Self {
        Self {
            window_h: default_window_h(),
            baseline_rolling: default_baseline_rolling(),
            calendar_profile: None,
        }
    }
}

fn default_window_h() -> u32 {
    24
}
fn default_baseline_rolling() -> bool {
    true
}

/// Field-path contract for JSON API payloads. Every selector accepts the
/// plural list form or a singular shorthand; the extractor falls back to the
/// conventional field names when neither is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at_fields: Option<Vec<String>>,
}

fn candidates(
    plural: &Option<Vec<String>>,
    singular: &Option<String>,
    defaults: &[&str],
) -> Vec<String> {
    if let Some(list) = plural {
        return list.iter().filter(|s| !s.trim().is_empty()).cloned().collect();
    }
    if let Some(single) = singular {
        if !single.trim().is_empty() {
            return vec![single.clone()];
        }
    }
    defaults.iter().map(|s| s.to_string()).collect()
}

impl ApiContract {
    pub fn title_candidates(&self) -> Vec<String> {
        candidates(&self.title_fields, &self.title_field, &["title", "titulo", "headline", "name"])
    }

    pub fn text_candidates(&self) -> Vec<String> {
        candidates(
            &self.text_fields,
            &self.text_field,
            &["text", "body", "content", "summary", "description", "titulo", "ementa"],
        )
    }

    pub fn url_candidates(&self) -> Vec<String> {
        candidates(&self.url_fields, &self.url_field, &["url", "link", "href"])
    }

    pub fn canonical_url_candidates(&self) -> Vec<String> {
        candidates(&self.canonical_url_fields, &None, &["canonical_url", "canonicalUrl"])
    }

    pub fn author_candidates(&self) -> Vec<String> {
        candidates(&self.author_fields, &None, &["author", "autor", "source_name"])
    }

    pub fn lang_candidates(&self) -> Vec<String> {
        candidates(&self.lang_fields, &None, &["lang", "language", "idioma"])
    }

    pub fn published_candidates(&self) -> Vec<String> {
        candidates(
            &self.published_at_fields,
            &self.published_at_field,
            &["published_at", "publishedAt", "publication_date", "date"],
        )
    }

    pub fn modified_candidates(&self) -> Vec<String> {
        candidates(
            &self.modified_at_fields,
            &self.modified_at_field,
            &["modified_at", "updated_at", "updatedAt", "last_modified"],
        )
    }

    fn validate(&self, key: &str) -> Result<(), String> {
        if let Some(path) = &self.items_path {
            if path.trim().is_empty() {
                return Err(format!("metadata.{key}.items_path must be a dotted path"));
            }
        }
        for (name, list) in [
            ("title_fields", &self.title_fields),
            ("text_fields", &self.text_fields),
            ("url_fields", &self.url_fields),
            ("canonical_url_fields", &self.canonical_url_fields),
            ("author_fields", &self.author_fields),
            ("lang_fields", &self.lang_fields),
            ("published_at_fields", &self.published_at_fields),
            ("modified_at_fields", &self.modified_at_fields),
        ] {
            if let Some(values) = list {
                if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
                    return Err(format!(
                        "metadata.{key}.{name} must be a non-empty list of strings"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Request shape for SPA APIs that need more than a plain GET.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ApiRequest {
    fn validate(&self, key: &str) -> Result<(), String> {
        if let Some(method) = &self.method {
            let upper = method.to_ascii_uppercase();
            if upper != "GET" && upper != "POST" {
                return Err(format!("metadata.{key}.method must be GET or POST"));
            }
        }
        if let Some(url) = &self.url {
            validate_http_url(url).map_err(|e| format!("metadata.{key}.url {e}"))?;
        }
        Ok(())
    }
}

/// `url_contains` accepts a single pattern or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn as_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// Capture of matching XHR JSON responses during headless rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadlessCapture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_contains: Option<StringOrList>,
    #[serde(default = "default_max_captures")]
    pub max_captures: usize,
    #[serde(default = "default_max_capture_bytes")]
    pub max_capture_bytes: usize,
}

fn default_max_captures() -> usize {
    5
}
fn default_max_capture_bytes() -> usize {
    262_144
}

impl HeadlessCapture {
    fn validate(&self) -> Result<(), String> {
        if let Some(patterns) = &self.url_contains {
            let values = patterns.as_vec();
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err("metadata.headless_capture.url_contains must be string or list of non-empty strings".into());
            }
        }
        Ok(())
    }
}

/// Strategy-specific metadata contracts. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_contract: Option<ApiContract>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spa_api_contract: Option<ApiContract>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_request: Option<ApiRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spa_api_request: Option<ApiRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless_capture: Option<HeadlessCapture>,
    /// Editorial lane hint carried over from the legacy catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editoria: Option<String>,
}

impl ProfileMetadata {
    /// The contract governing JSON item extraction, SPA variant first.
    pub fn contract(&self) -> Option<&ApiContract> {
        self.spa_api_contract.as_ref().or(self.api_contract.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Catalog row id, present once the source is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
    pub tier: u8,
    #[serde(default)]
    pub is_official: bool,
    #[serde(default = "default_lang")]
    pub lang: String,
    pub pool: Pool,
    pub strategy: Strategy,
    pub endpoints: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub cadence: Cadence,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub observability: Observability,
    #[serde(default)]
    pub metadata: ProfileMetadata,
}

fn default_lang() -> String {
    "pt-BR".to_string()
}

fn validate_http_url(raw: &str) -> Result<(), String> {
    let parsed = Url::parse(raw).map_err(|_| "must be a valid http(s) URL".to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err("must be a valid http(s) URL".to_string());
    }
    Ok(())
}

impl SourceProfile {
    /// Parse a profile from its stored JSON and validate the full contract.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RadarError> {
        let profile: SourceProfile = serde_json::from_value(value)
            .map_err(|e| RadarError::InvalidProfile(e.to_string()))?;
        profile.validate().map_err(RadarError::InvalidProfile)?;
        Ok(profile)
    }

    /// URL the fetcher should hit, by strategy priority. `None` means no-op.
    pub fn fetch_url(&self) -> Option<&str> {
        self.strategy
            .endpoint_priority()
            .iter()
            .find_map(|key| self.endpoints.get(*key).map(String::as_str))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.source_id.trim().is_empty() {
            return Err("source_id must be non-empty".into());
        }
        if !(1..=3).contains(&self.tier) {
            return Err(format!("tier must be 1..=3, got {}", self.tier));
        }

        if self.endpoints.is_empty() {
            return Err("at least one endpoint must be defined".into());
        }
        for (key, raw) in &self.endpoints {
            if key.trim().is_empty() {
                return Err("endpoint keys must be non-empty".into());
            }
            validate_http_url(raw).map_err(|e| format!("endpoint '{key}' {e}"))?;
        }

        self.cadence.validate()?;

        // Strategy / pool pairings are fixed.
        match (self.strategy, self.pool) {
            (Strategy::SpaHeadless, pool) if pool != Pool::HeavyRender => {
                return Err("SPA_HEADLESS must use the HEAVY_RENDER pool".into());
            }
            (Strategy::SpaApi, pool) if pool != Pool::HeavyRender => {
                return Err("SPA_API must use the HEAVY_RENDER pool".into());
            }
            (Strategy::Pdf, pool) if pool != Pool::DeepExtract => {
                return Err("PDF must use the DEEP_EXTRACT pool".into());
            }
            (Strategy::Feed, pool) if pool != Pool::Fast => {
                return Err("FEED must use the FAST pool".into());
            }
            _ => {}
        }

        // At least one endpoint key matching the strategy.
        let keys: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        let required: &[&str] = match self.strategy {
            Strategy::Feed => &["feed"],
            Strategy::Api | Strategy::SpaApi => &["api", "latest", "feed"],
            Strategy::Html | Strategy::SpaHeadless | Strategy::Pdf => &["latest", "feed", "api"],
        };
        if !required.iter().any(|k| keys.contains(k)) {
            return Err(format!(
                "{} strategy requires one of endpoints.{}",
                self.strategy,
                required.join("/")
            ));
        }

        if self.strategy == Strategy::SpaApi && self.metadata.contract().is_none() {
            return Err("SPA_API requires metadata.spa_api_contract (or api_contract)".into());
        }

        if let Some(contract) = &self.metadata.api_contract {
            contract.validate("api_contract")?;
        }
        if let Some(contract) = &self.metadata.spa_api_contract {
            contract.validate("spa_api_contract")?;
        }
        if let Some(req) = &self.metadata.api_request {
            req.validate("api_request")?;
        }
        if let Some(req) = &self.metadata.spa_api_request {
            req.validate("spa_api_request")?;
        }
        if let Some(capture) = &self.metadata.headless_capture {
            capture.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_profile() -> serde_json::Value {
        json!({
            "source_id": "gov_cgu",
            "source_domain": "gov.br",
            "tier": 1,
            "is_official": true,
            "pool": "FAST",
            "strategy": "FEED",
            "endpoints": {"feed": "https://www.gov.br/cgu/noticias/rss"},
            "cadence": {"interval_seconds": 300}
        })
    }

    #[test]
    fn accepts_minimal_feed_profile() {
        let profile = SourceProfile::from_value(base_profile()).unwrap();
        assert_eq!(profile.strategy, Strategy::Feed);
        assert_eq!(profile.limits.rate_per_min, 10);
        assert_eq!(profile.fetch_url(), Some("https://www.gov.br/cgu/noticias/rss"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut value = base_profile();
        value["legacy_field"] = json!("whatever");
        value["metadata"] = json!({"unknown_contract": {"x": 1}});
        assert!(SourceProfile::from_value(value).is_ok());
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut value = base_profile();
        value["endpoints"] = json!({"feed": "ftp://example.com/feed"});
        let err = SourceProfile::from_value(value).unwrap_err();
        assert!(err.to_string().contains("http(s)"), "{err}");
    }

    #[test]
    fn rejects_missing_cadence() {
        let mut value = base_profile();
        value["cadence"] = json!({});
        let err = SourceProfile::from_value(value).unwrap_err();
        assert!(err.to_string().contains("cadence"), "{err}");
    }

    #[test]
    fn rejects_cadence_with_both_forms() {
        let mut value = base_profile();
        value["cadence"] = json!({"interval_seconds": 300, "cron": "*/5 * * * *"});
        assert!(SourceProfile::from_value(value).is_err());
    }

    #[test]
    fn rejects_four_field_cron() {
        let mut value = base_profile();
        value["cadence"] = json!({"cron": "* * * *"});
        let err = SourceProfile::from_value(value).unwrap_err();
        assert!(err.to_string().contains("5 fields"), "{err}");
    }

    #[test]
    fn enforces_strategy_pool_pairing() {
        let mut value = base_profile();
        value["strategy"] = json!("SPA_HEADLESS");
        value["endpoints"] = json!({"latest": "https://portal.example.gov.br/ultimas"});
        let err = SourceProfile::from_value(value).unwrap_err();
        assert!(err.to_string().contains("HEAVY_RENDER"), "{err}");
    }

    #[test]
    fn feed_requires_feed_endpoint() {
        let mut value = base_profile();
        value["endpoints"] = json!({"latest": "https://example.com/news"});
        assert!(SourceProfile::from_value(value).is_err());
    }

    #[test]
    fn spa_api_requires_contract() {
        let mut value = base_profile();
        value["strategy"] = json!("SPA_API");
        value["pool"] = json!("HEAVY_RENDER");
        value["endpoints"] = json!({"api": "https://example.com/api/news"});
        let err = SourceProfile::from_value(value).unwrap_err();
        assert!(err.to_string().contains("spa_api_contract"), "{err}");

        let mut value = base_profile();
        value["strategy"] = json!("SPA_API");
        value["pool"] = json!("HEAVY_RENDER");
        value["endpoints"] = json!({"api": "https://example.com/api/news"});
        value["metadata"] = json!({"spa_api_contract": {"items_path": "data.items"}});
        assert!(SourceProfile::from_value(value).is_ok());
    }

    #[test]
    fn rejects_empty_field_list() {
        let mut value = base_profile();
        value["metadata"] = json!({"api_contract": {"text_fields": []}});
        let err = SourceProfile::from_value(value).unwrap_err();
        assert!(err.to_string().contains("text_fields"), "{err}");
    }

    #[test]
    fn headless_capture_accepts_string_or_list() {
        let mut value = base_profile();
        value["metadata"] = json!({"headless_capture": {"url_contains": "/api/"}});
        let profile = SourceProfile::from_value(value).unwrap();
        let capture = profile.metadata.headless_capture.unwrap();
        assert_eq!(capture.url_contains.unwrap().as_vec(), vec!["/api/"]);

        let mut value = base_profile();
        value["metadata"] =
            json!({"headless_capture": {"url_contains": ["/api/", "/graphql"]}});
        assert!(SourceProfile::from_value(value).is_ok());
    }

    #[test]
    fn interval_cadence_due_logic() {
        let cadence = Cadence { interval_seconds: Some(300), cron: None };
        let now = Utc::now();
        assert!(cadence.is_due(None, now));
        assert!(!cadence.is_due(Some(now - Duration::seconds(299)), now));
        assert!(cadence.is_due(Some(now - Duration::seconds(300)), now));
    }

    #[test]
    fn cron_cadence_due_logic() {
        let cadence = Cadence { interval_seconds: None, cron: Some("*/5 * * * *".into()) };
        let now = Utc::now();
        // Over an hour stale: some 5-minute boundary has passed since.
        assert!(cadence.is_due(Some(now - Duration::hours(2)), now));
        // Attempted just now: the next boundary is in the future.
        assert!(!cadence.is_due(Some(now), now));
        // Never attempted: reference is now-1d, so it is due.
        assert!(cadence.is_due(None, now));
    }

    #[test]
    fn api_contract_candidates_fall_back_to_defaults() {
        let contract = ApiContract::default();
        assert!(contract.text_candidates().contains(&"content".to_string()));
        let contract = ApiContract {
            text_field: Some("ementa".into()),
            ..Default::default()
        };
        assert_eq!(contract.text_candidates(), vec!["ementa"]);
        let contract = ApiContract {
            text_fields: Some(vec!["a".into(), "b".into()]),
            text_field: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(contract.text_candidates(), vec!["a", "b"]);
    }
}
