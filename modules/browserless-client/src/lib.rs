pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use tracing::debug;

/// Default wall-clock budget for one render. Browserless holds the page open
/// until load or this deadline, whichever comes first.
const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for a single /content render request.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Lifecycle event to wait for before the DOM is serialized.
    pub wait_until: &'static str,
    /// Per-request navigation timeout in milliseconds, enforced server-side.
    pub timeout_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            wait_until: "networkidle2",
            timeout_ms: 25_000,
        }
    }
}

/// Client for a Browserless deployment. Each `content` call is one scoped
/// render: the service opens a page, serializes the DOM, and closes the page
/// before responding, so no browser state outlives the request on any exit
/// path (success, empty DOM, or error).
pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_RENDER_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{}", self.base_url, path);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Fetch fully-rendered HTML for a URL via the /content endpoint.
    pub async fn content(&self, url: &str) -> Result<String> {
        self.content_with(url, &RenderOptions::default()).await
    }

    /// Fetch fully-rendered HTML with explicit render options.
    pub async fn content_with(&self, url: &str, opts: &RenderOptions) -> Result<String> {
        let body = serde_json::json!({
            "url": url,
            "gotoOptions": {
                "waitUntil": opts.wait_until,
                "timeout": opts.timeout_ms,
            },
        });

        debug!(url, wait_until = opts.wait_until, "Requesting rendered content");

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

    /// Check whether the deployment is accepting work. Maps the /pressure
    /// endpoint's `isAvailable` field; any non-2xx response counts as
    /// unavailable rather than an error.
    pub async fn is_available(&self) -> Result<bool> {
        let resp = self.client.get(self.endpoint("/pressure")).send().await?;
        if !resp.status().is_success() {
            return Ok(false);
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(body
            .pointer("/pressure/isAvailable")
            .and_then(|v| v.as_bool())
            .unwrap_or(true))
    }
}
