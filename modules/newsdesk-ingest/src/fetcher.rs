use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::traits::PageFetcher;

/// Identifying User-Agent sent on every request.
pub const USER_AGENT: &str = "newsdesk-ingest/0.1 (+article monitoring; contact: ops@newsdesk)";

/// Minimum spacing between two requests to the same hostname.
const MIN_DOMAIN_SPACING: Duration = Duration::from_secs(2);

/// Retries after the initial attempt for 429 and 5xx responses.
const MAX_RETRIES: u32 = 3;

/// Default per-request budget. Callers with slower targets (full article
/// pages, feed endpoints behind CDNs) pass their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("http status {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// How a response status is retried, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryClass {
    /// 429 — exponential backoff.
    RateLimited,
    /// 5xx — linear backoff.
    ServerError,
    /// Other 4xx — no retry.
    Fatal,
}

impl RetryClass {
    fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(RetryClass::RateLimited),
            500..=599 => Some(RetryClass::ServerError),
            400..=499 => Some(RetryClass::Fatal),
            _ => None,
        }
    }
}

/// Backoff before retry `attempt` (1-based): 429 doubles, 5xx grows linearly.
fn backoff_delay(class: RetryClass, attempt: u32) -> Duration {
    match class {
        RetryClass::RateLimited => Duration::from_millis(1000 * 2u64.pow(attempt - 1)),
        RetryClass::ServerError => Duration::from_millis(1000 * attempt as u64),
        RetryClass::Fatal => Duration::ZERO,
    }
}

/// HTTP client that enforces per-domain request spacing and the retry policy
/// above. Shared by discovery, feed fetching, and static scraping so one run
/// presents a single polite identity to every host.
pub struct RateLimitedFetcher {
    client: reqwest::Client,
    default_timeout: Duration,
    /// Hostname → reserved time of the most recent request.
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimitedFetcher {
    pub fn new(default_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            default_timeout,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next request slot for `host`, sleeping out the remainder
    /// of the spacing window if the previous request was too recent.
    async fn reserve_slot(&self, host: &str) {
        let wait = {
            let mut map = self.last_request.lock().await;
            let now = Instant::now();
            let wait = match map.get(host) {
                Some(last) => MIN_DOMAIN_SPACING.saturating_sub(now.duration_since(*last)),
                None => Duration::ZERO,
            };
            map.insert(host.to_string(), now + wait);
            wait
        };

        if !wait.is_zero() {
            debug!(host, wait_ms = wait.as_millis() as u64, "Spacing request to host");
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let parsed =
            url::Url::parse(url).map_err(|e| FetchError::Network(format!("invalid url: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::Network("url has no host".to_string()))?
            .to_string();

        let mut attempt = 0u32;
        loop {
            self.reserve_slot(&host).await;

            let resp = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        FetchError::Timeout
                    } else {
                        FetchError::Network(e.to_string())
                    }
                })?;

            let status = resp.status().as_u16();
            match RetryClass::from_status(status) {
                None => {
                    let final_url = resp.url().to_string();
                    let body = resp
                        .bytes()
                        .await
                        .map_err(|e| FetchError::Network(e.to_string()))?;
                    return Ok(FetchedPage {
                        url: final_url,
                        status,
                        body: body.to_vec(),
                    });
                }
                Some(RetryClass::Fatal) => return Err(FetchError::HttpStatus(status)),
                Some(class) => {
                    attempt += 1;
                    if attempt > MAX_RETRIES {
                        return Err(FetchError::HttpStatus(status));
                    }
                    let delay = backoff_delay(class, attempt);
                    warn!(
                        url,
                        status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl PageFetcher for RateLimitedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch_inner(url, self.default_timeout).await
    }

    async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch_inner(url, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_backoff_doubles() {
        assert_eq!(
            backoff_delay(RetryClass::RateLimited, 1),
            Duration::from_millis(1000)
        );
        assert_eq!(
            backoff_delay(RetryClass::RateLimited, 2),
            Duration::from_millis(2000)
        );
        assert_eq!(
            backoff_delay(RetryClass::RateLimited, 3),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn server_error_backoff_is_linear() {
        assert_eq!(
            backoff_delay(RetryClass::ServerError, 1),
            Duration::from_millis(1000)
        );
        assert_eq!(
            backoff_delay(RetryClass::ServerError, 2),
            Duration::from_millis(2000)
        );
        assert_eq!(
            backoff_delay(RetryClass::ServerError, 3),
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn status_classification() {
        assert_eq!(RetryClass::from_status(200), None);
        assert_eq!(RetryClass::from_status(301), None);
        assert_eq!(RetryClass::from_status(429), Some(RetryClass::RateLimited));
        assert_eq!(RetryClass::from_status(503), Some(RetryClass::ServerError));
        assert_eq!(RetryClass::from_status(403), Some(RetryClass::Fatal));
        assert_eq!(RetryClass::from_status(404), Some(RetryClass::Fatal));
    }

    #[tokio::test]
    async fn slot_reservation_spaces_same_host() {
        let fetcher = RateLimitedFetcher::new(DEFAULT_TIMEOUT);

        let start = Instant::now();
        fetcher.reserve_slot("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(100));

        // Second reservation for the same host must wait out the window;
        // a different host goes through immediately.
        let other = Instant::now();
        fetcher.reserve_slot("other.example").await;
        assert!(other.elapsed() < Duration::from_millis(100));
    }
}
