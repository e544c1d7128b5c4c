// Reference in-memory ArticleStore.
//
// The production deployment supplies its own implementation backed by the
// persistence service; this one keeps the binary runnable stand-alone and
// gives tests a real uniqueness constraint on `link`.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use newsdesk_common::{Article, ArticlePatch, Source};

use crate::traits::{ArticleStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    sources: Mutex<Vec<Source>>,
    articles: Mutex<HashMap<String, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<Source>) -> Self {
        Self {
            sources: Mutex::new(sources),
            articles: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_source(&self, source: Source) {
        self.sources.lock().expect("sources lock").push(source);
    }

    /// Snapshot of stored articles, insertion-order independent.
    pub fn articles(&self) -> Vec<Article> {
        self.articles
            .lock()
            .expect("articles lock")
            .values()
            .cloned()
            .collect()
    }

    pub fn article_count(&self) -> usize {
        self.articles.lock().expect("articles lock").len()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.sources.lock().expect("sources lock").clone())
    }

    async fn article_exists(&self, link: &str) -> Result<bool> {
        Ok(self.articles.lock().expect("articles lock").contains_key(link))
    }

    async fn insert_article(&self, article: &Article) -> std::result::Result<Uuid, StoreError> {
        let mut articles = self.articles.lock().expect("articles lock");
        if articles.contains_key(&article.link) {
            return Err(StoreError::DuplicateLink(article.link.clone()));
        }
        articles.insert(article.link.clone(), article.clone());
        Ok(article.id)
    }

    async fn update_article(&self, id: Uuid, patch: ArticlePatch) -> Result<()> {
        let mut articles = self.articles.lock().expect("articles lock");
        let article = articles
            .values_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow::anyhow!("no article with id {id}"))?;

        if let Some(title) = patch.title {
            article.title = title;
        }
        if let Some(content) = patch.content {
            article.content = content;
        }
        if let Some(description) = patch.description {
            article.description = description;
        }
        if let Some(pub_date) = patch.pub_date {
            article.pub_date = Some(pub_date);
        }
        if let Some(status) = patch.status {
            article.status = status;
        }
        if let Some(seen) = patch.seen {
            article.seen = seen;
        }
        article.updated_at = Utc::now();
        Ok(())
    }

    async fn update_source_last_checked(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut sources = self.sources.lock().expect("sources lock");
        if let Some(source) = sources.iter_mut().find(|s| s.id == id) {
            source.last_checked_at = Some(at);
        }
        Ok(())
    }

    async fn articles_missing_date(&self, limit: usize) -> Result<Vec<Article>> {
        let articles = self.articles.lock().expect("articles lock");
        let mut missing: Vec<Article> = articles
            .values()
            .filter(|a| a.pub_date.is_none())
            .cloned()
            .collect();
        missing.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        missing.truncate(limit);
        Ok(missing)
    }
}
