use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for an extraction run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub source_url: String,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_articles: Option<u32>,
}

/// Top-level response envelope.
#[derive(Debug, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub articles: Vec<ExtractedArticle>,
}

/// One article as reported by the extraction agent. Every field is untrusted:
/// links may point at foreign domains, dates may be fabricated, and the set
/// may legitimately be empty. Callers validate before use.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedArticle {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}
