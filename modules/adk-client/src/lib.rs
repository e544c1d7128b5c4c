pub mod error;
pub mod types;

pub use error::{AdkError, Result};
pub use types::{ExtractRequest, ExtractResponse, ExtractedArticle};

use std::time::Duration;

use tracing::debug;

/// Agent extraction is slow: it navigates the site and reasons about the
/// page structure. Budget accordingly.
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(180);

pub struct AdkClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AdkClient {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(EXTRACT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
        }
    }

    /// Run one extraction pass against a source site. Returns whatever the
    /// agent reports; zero articles and wrong-domain links are valid
    /// responses that the caller must detect.
    pub async fn extract(&self, req: &ExtractRequest) -> Result<Vec<ExtractedArticle>> {
        debug!(source_url = req.source_url.as_str(), "Requesting agent extraction");

        let mut request = self
            .client
            .post(format!("{}/extract", self.base_url))
            .json(req);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AdkError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ExtractResponse = resp.json().await?;
        Ok(body.articles)
    }
}
