use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Source ---

/// How a source is monitored. Decided once at source setup, never re-derived
/// during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringType {
    /// The stored URL is a working feed URL; items come from feed parsing.
    Rss,
    /// No feed exists; items come from DOM scraping of the site.
    Scraping,
    /// Items come from the agent extraction service, with scraping as fallback.
    Adk,
}

impl std::fmt::Display for MonitoringType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitoringType::Rss => write!(f, "rss"),
            MonitoringType::Scraping => write!(f, "scraping"),
            MonitoringType::Adk => write!(f, "adk"),
        }
    }
}

/// A monitored publication. For `MonitoringType::Rss` the `url` field holds
/// the feed URL itself, not the site URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    pub category: String,
    pub monitoring: MonitoringType,
    pub paused: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

// --- Article ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    New,
    Selected,
    Dismissed,
    Sent,
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArticleStatus::New => write!(f, "new"),
            ArticleStatus::Selected => write!(f, "selected"),
            ArticleStatus::Dismissed => write!(f, "dismissed"),
            ArticleStatus::Sent => write!(f, "sent"),
        }
    }
}

/// Canonical article record. `link` is the sole identity key: two fetches of
/// the same URL, however extracted, must collapse to one Article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Short hook/preview text, at most 300 chars.
    pub description: String,
    pub link: String,
    /// None means "publish date unknown", never a guessed or default date.
    pub pub_date: Option<DateTime<Utc>>,
    pub source_id: Uuid,
    pub source_name: String,
    pub category: String,
    pub status: ArticleStatus,
    pub seen: bool,
    /// Batch marker: all articles from one ingestion pass share a session id.
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to an existing article. `None` fields are left
/// untouched by the store.
#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
    pub status: Option<ArticleStatus>,
    pub seen: Option<bool>,
}

// --- RawItem ---

/// Source-format intermediate: one shape for feed entries, JSON Feed items,
/// agent-extractor payloads, and scraped listing links. Field access is
/// explicit here so the extraction pipeline never duck-types per format.
/// Ephemeral; never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    pub link: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub content_snippet: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub content_encoded: Option<String>,
    pub media_description: Option<String>,
    pub author: Option<String>,
    /// Parsed publish date when the source format carried one.
    pub pub_date: Option<DateTime<Utc>>,
    /// Unparsed date string, kept for the date heuristics to retry.
    pub raw_date: Option<String>,
}

impl RawItem {
    pub fn with_link(link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            ..Self::default()
        }
    }
}
