pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Deserialize;
use tracing::info;

/// Options for one rendered fetch.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// User-Agent sent by the browser context.
    pub user_agent: Option<String>,
    /// Block images/fonts/stylesheets to cut bandwidth and render time.
    pub block_assets: bool,
    /// Capture XHR/fetch JSON responses whose URL contains any of these.
    pub capture_url_contains: Vec<String>,
    /// Maximum captured responses.
    pub max_captures: usize,
    /// Maximum size per captured response body, in bytes.
    pub max_capture_bytes: usize,
    /// Navigation timeout.
    pub timeout: Duration,
}

/// A rendered page plus any captured XHR JSON payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Rendered {
    pub html: String,
    #[serde(default)]
    pub captures: Vec<CapturedResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapturedResponse {
    pub url: String,
    pub body: String,
}

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Puppeteer script executed by the Browserless /function endpoint. Blocks
/// asset requests, records matching JSON XHR responses, and returns the
/// rendered DOM together with the captures.
const RENDER_FN: &str = r#"
export default async function ({ page, context }) {
  const { url, userAgent, blockAssets, captureContains, maxCaptures, maxCaptureBytes, timeoutMs } = context;
  const captures = [];
  if (userAgent) {
    await page.setUserAgent(userAgent);
  }
  if (blockAssets) {
    await page.setRequestInterception(true);
    page.on("request", (req) => {
      const type = req.resourceType();
      if (type === "image" || type === "font" || type === "stylesheet" || type === "media") {
        return req.abort();
      }
      return req.continue();
    });
  }
  if (captureContains.length > 0) {
    page.on("response", async (resp) => {
      if (captures.length >= maxCaptures) return;
      const respUrl = resp.url();
      if (!captureContains.some((p) => respUrl.includes(p))) return;
      const contentType = (resp.headers()["content-type"] || "").toLowerCase();
      if (!contentType.includes("json")) return;
      try {
        const body = await resp.text();
        if (body.length > 0 && body.length <= maxCaptureBytes) {
          captures.push({ url: respUrl, body });
        }
      } catch (e) {
        // Response bodies of redirected/aborted requests are unavailable.
      }
    });
  }
  await page.goto(url, { waitUntil: "networkidle2", timeout: timeoutMs });
  const html = await page.content();
  return { data: { html, captures }, type: "application/json" };
}
"#;

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Fetch fully-rendered HTML content for a URL via the /content endpoint.
    /// No interception, no captures; the cheap path.
    pub async fn content(&self, url: &str) -> Result<String> {
        let body = serde_json::json!({ "url": url });

        let resp = self
            .client
            .post(self.endpoint("/content"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Render a page via the /function endpoint with asset blocking and
    /// bounded XHR JSON capture.
    pub async fn render(&self, url: &str, options: &RenderOptions) -> Result<Rendered> {
        let timeout_ms = options.timeout.as_millis().max(1_000) as u64;
        let body = serde_json::json!({
            "code": RENDER_FN,
            "context": {
                "url": url,
                "userAgent": options.user_agent,
                "blockAssets": options.block_assets,
                "captureContains": options.capture_url_contains,
                "maxCaptures": options.max_captures,
                "maxCaptureBytes": options.max_capture_bytes,
                "timeoutMs": timeout_ms,
            }
        });

        let resp = self
            .client
            .post(self.endpoint("/function"))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_millis(timeout_ms + 30_000))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let rendered: Rendered = resp
            .json()
            .await
            .map_err(|e| BrowserlessError::Decode(e.to_string()))?;
        info!(
            url,
            bytes = rendered.html.len(),
            captures = rendered.captures.len(),
            "Rendered page via browserless"
        );
        Ok(rendered)
    }
}
