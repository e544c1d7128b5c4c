// Canonical article extraction: raw items in, article fields out.
//
// Layered fallbacks throughout: feed fields first, a full-page fetch when
// the feed stub is too thin, heuristic repairs for swapped/ruined titles,
// and a date that is only ever a parsed, plausible date or unknown.

pub mod clean;
pub mod content;
pub mod date;
pub mod page;
pub mod preview;
pub mod title;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use newsdesk_common::RawItem;

pub use page::PageMetadata;

use crate::dedup::sanitize_link;
use crate::fetcher::FetchError;
use crate::traits::PageFetcher;

/// Budget for fetching a full article page mid-extraction.
const FULL_PAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Canonical fields for one article, pre-persistence.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub title: String,
    pub content: String,
    pub description: String,
    pub link: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

pub struct ExtractionPipeline {
    fetcher: Arc<dyn PageFetcher>,
}

impl ExtractionPipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Normalize one raw item into article fields. Fails only when the item
    /// has no usable link; every content/title/date problem degrades through
    /// a fallback instead.
    pub async fn article_fields(&self, item: &RawItem, now: DateTime<Utc>) -> Result<ArticleDraft> {
        let link = item
            .link
            .as_deref()
            .map(sanitize_link)
            .filter(|l| l.starts_with("http"))
            .context("Item has no usable link")?;

        // Content: feed fields by preference, the link as a placeholder when
        // everything is too thin to use.
        let inline = content::content_from_item(item);
        let mut body = clean::clean_content(inline.as_deref().unwrap_or(&link));

        // Thin content and a real link: fetch the article page and keep
        // whichever body is longer.
        let mut page_meta: Option<PageMetadata> = None;
        if body.chars().count() < content::FULL_FETCH_THRESHOLD {
            page_meta = self.fetch_page_metadata(&link, now).await;
            if let Some(meta) = &page_meta {
                if meta.content.chars().count() > body.chars().count() {
                    body = meta.content.clone();
                }
            }
        }

        let feed_title = item
            .title
            .clone()
            .or_else(|| page_meta.as_ref().and_then(|m| m.title.clone()));
        let (title, body) = title::resolve(feed_title, body, Some(&link));

        let pub_date = date::item_pub_date(item, now)
            .or_else(|| page_meta.as_ref().and_then(|m| m.pub_date));

        let description = item
            .description
            .as_deref()
            .or(item.summary.as_deref())
            .map(clean::clean_content)
            .filter(|d| !d.trim().is_empty())
            .map(|d| preview::truncate_preview(&d))
            .or_else(|| page_meta.as_ref().and_then(|m| m.description.clone()))
            .or_else(|| preview::first_paragraph(&body))
            .unwrap_or_default();

        let author = item
            .author
            .clone()
            .or_else(|| page_meta.as_ref().and_then(|m| m.author.clone()));

        Ok(ArticleDraft {
            title,
            content: body,
            description,
            link,
            pub_date,
            author,
        })
    }

    /// Fetch and extract a full article page. A 403 degrades to None; the
    /// caller keeps whatever feed text it already has rather than failing
    /// the article.
    async fn fetch_page_metadata(&self, link: &str, now: DateTime<Utc>) -> Option<PageMetadata> {
        match self
            .fetcher
            .fetch_with_timeout(link, FULL_PAGE_TIMEOUT)
            .await
        {
            Ok(page) if (200..300).contains(&page.status) => {
                Some(page::extract_metadata(&page.text(), link, now))
            }
            Ok(page) => {
                debug!(link, status = page.status, "Full-page fetch non-success");
                None
            }
            Err(FetchError::HttpStatus(403)) => {
                debug!(link, "Full-page fetch forbidden, degrading to feed text");
                None
            }
            Err(e) => {
                warn!(link, error = %e, "Full-page fetch failed");
                None
            }
        }
    }

    /// Extract article metadata straight from a page URL (the API-facing
    /// operation and the enrichment pass both use this).
    pub async fn page_metadata(&self, url: &str, now: DateTime<Utc>) -> Result<PageMetadata> {
        let page = self
            .fetcher
            .fetch_with_timeout(url, FULL_PAGE_TIMEOUT)
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;
        Ok(page::extract_metadata(&page.text(), url, now))
    }
}
