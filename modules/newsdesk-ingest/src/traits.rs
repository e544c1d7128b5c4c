// Trait abstractions for ingestion dependencies.
//
// PageFetcher — all plain HTTP fetching behind one trait.
// ArticleStore — the persistence collaborator (sources, articles, dedup key).
// ArticleExtractor — the agent extraction service, treated as untrusted.
// Summarizer — preview/hook text generation; never load-bearing.
//
// These enable deterministic testing with MockFetcher, MemoryStore and
// MockExtractor: no network, no database.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use newsdesk_common::{Article, ArticlePatch, RawItem, Source};

use crate::fetcher::{FetchError, FetchedPage};

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a URL with the fetcher's default timeout.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Fetch a URL with an explicit timeout budget.
    async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError>;
}

// ---------------------------------------------------------------------------
// ArticleStore
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    /// The `link` uniqueness constraint fired. Callers treat this as
    /// "already ingested", never as a failure.
    #[error("duplicate link: {0}")]
    DuplicateLink(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<Source>>;

    /// Whether an article with this (sanitized) link already exists.
    async fn article_exists(&self, link: &str) -> Result<bool>;

    /// Insert a new article. A uniqueness violation on `link` surfaces as
    /// `StoreError::DuplicateLink` so races between concurrent ingestion
    /// paths collapse to one record.
    async fn insert_article(&self, article: &Article) -> std::result::Result<Uuid, StoreError>;

    async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<()>;

    async fn update_source_last_checked(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Most recent articles whose publish date is still unknown, for the
    /// date-enrichment pass.
    async fn articles_missing_date(&self, limit: usize) -> Result<Vec<Article>>;
}

// ---------------------------------------------------------------------------
// ArticleExtractor
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// Ask the agent extraction service for the source's current articles.
    /// An empty set and wrong-domain links are both legitimate responses;
    /// the scheduler detects them and falls back to scraping.
    async fn extract_articles(&self, source: &Source) -> Result<Vec<RawItem>>;
}

#[async_trait]
impl ArticleExtractor for adk_client::AdkClient {
    async fn extract_articles(&self, source: &Source) -> Result<Vec<RawItem>> {
        let req = adk_client::ExtractRequest {
            source_url: source.url.clone(),
            source_name: source.name.clone(),
            max_articles: Some(20),
        };
        let extracted = self.extract(&req).await?;

        Ok(extracted
            .into_iter()
            .filter(|a| !a.url.trim().is_empty())
            .map(|a| RawItem {
                link: Some(a.url),
                title: a.title,
                content: a.content,
                summary: a.summary,
                author: a.author,
                pub_date: a.published_at,
                ..RawItem::default()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a short hook/preview for an article. Failures degrade to the
    /// heuristic description, so implementations may be best-effort.
    async fn summarize(&self, title: &str, content: &str, source_name: &str) -> Result<String>;
}
