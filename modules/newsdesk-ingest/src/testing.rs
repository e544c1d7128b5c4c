// Test doubles for the ingestion pipeline.
//
// Mocks matching the trait boundaries: MockFetcher (PageFetcher) serves
// canned responses from a URL map, MockExtractor (ArticleExtractor) returns
// fixed item sets, FixedMemory (MemorySampler) simulates memory pressure.
// MemoryStore from `store` doubles as the stateful store mock. No network,
// no database.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use newsdesk_common::{MonitoringType, RawItem, Source};

use crate::fetcher::{FetchError, FetchedPage};
use crate::governor::MemorySampler;
use crate::scrape::PageRenderer;
use crate::traits::{ArticleExtractor, PageFetcher, Summarizer};

pub use crate::store::MemoryStore;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// URL → canned response fetcher. Unregistered URLs fail with a network
/// error, mimicking an unreachable host.
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<FetchedPage, FetchError>>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve a 200 response with the given body.
    pub fn on_page(self, url: &str, body: &str) -> Self {
        self.responses.lock().expect("responses lock").insert(
            url.to_string(),
            Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body: body.as_bytes().to_vec(),
            }),
        );
        self
    }

    /// Serve a typed fetch error.
    pub fn on_error(self, url: &str, error: FetchError) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(url.to_string(), Err(error));
        self
    }

    /// URLs fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(url.to_string());
        self.responses
            .lock()
            .expect("responses lock")
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network(format!("no response registered for {url}"))))
    }

    async fn fetch_with_timeout(
        &self,
        url: &str,
        _timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch(url).await
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Source URL → fixed extraction results.
pub struct MockExtractor {
    results: Mutex<HashMap<String, Vec<RawItem>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
        }
    }

    pub fn on_source(self, source_url: &str, items: Vec<RawItem>) -> Self {
        self.results
            .lock()
            .expect("results lock")
            .insert(source_url.to_string(), items);
        self
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleExtractor for MockExtractor {
    async fn extract_articles(&self, source: &Source) -> Result<Vec<RawItem>> {
        self.results
            .lock()
            .expect("results lock")
            .get(&source.url)
            .cloned()
            .ok_or_else(|| anyhow!("MockExtractor: no result registered for {}", source.url))
    }
}

// ---------------------------------------------------------------------------
// FixedMemory / FixedRenderer / FixedSummarizer
// ---------------------------------------------------------------------------

/// Memory sampler reporting a fixed resident size.
pub struct FixedMemory(pub Option<u64>);

impl MemorySampler for FixedMemory {
    fn resident_bytes(&self) -> Option<u64> {
        self.0
    }
}

/// Renderer returning one fixed HTML document for every URL.
pub struct FixedRenderer(pub String);

#[async_trait]
impl PageRenderer for FixedRenderer {
    async fn render(&self, _url: &str) -> Result<String> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Summarizer echoing a fixed hook.
pub struct FixedSummarizer(pub String);

#[async_trait]
impl Summarizer for FixedSummarizer {
    async fn summarize(&self, _title: &str, _content: &str, _source_name: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

pub fn make_source(name: &str, url: &str, monitoring: MonitoringType) -> Source {
    Source {
        id: Uuid::new_v4(),
        url: url.to_string(),
        name: name.to_string(),
        category: "news".to_string(),
        monitoring,
        paused: false,
        last_checked_at: Some(Utc::now()),
    }
}
