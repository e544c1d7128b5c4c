// Ingestion scheduling and orchestration.
//
// One Ingestor value owns the whole pipeline; the Monitor value owns the
// lifecycle. Sources run sequentially, items in feed order, and exactly one
// pass runs at a time; a manual trigger and the periodic timer contend on
// the same pass flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use newsdesk_common::{
    Article, ArticleStatus, Config, MonitoringType, NewsdeskError, RawItem, Source,
};

use crate::dedup::DedupGuard;
use crate::discovery::FeedDiscovery;
use crate::extract::{preview, title, ExtractionPipeline, PageMetadata};
use crate::feed;
use crate::fetcher::RateLimitedFetcher;
use crate::governor::{ProcMemorySampler, ResourceGovernor};
use crate::scrape::{items_from_listing, SiteScraper};
use crate::traits::{ArticleExtractor, ArticleStore, PageFetcher, StoreError, Summarizer};
use crate::{enrich, fetcher};

/// Articles are processed in batches of this size to bound peak memory.
const ARTICLE_BATCH_SIZE: usize = 3;

/// Pause between article batches.
const BATCH_PAUSE: Duration = Duration::from_millis(250);

const FEED_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Scraped pages must yield at least this much text to store an article.
const MIN_SCRAPED_CONTENT: usize = 100;

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Periodic monitoring is administratively stopped. Manual passes may
    /// still run.
    Stopped,
    /// Monitoring is on, no pass in flight.
    Idle,
    /// A pass is in flight.
    Running,
}

/// Explicit scheduler lifecycle value, shared by reference between the
/// periodic loop and manual callers. The pass flag is the only mutual
/// exclusion in the system.
pub struct Monitor {
    enabled: AtomicBool,
    pass_running: AtomicBool,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            pass_running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        info!("Periodic monitoring started");
    }

    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        info!("Periodic monitoring stopped");
    }

    pub fn state(&self) -> MonitorState {
        if self.pass_running.load(Ordering::SeqCst) {
            MonitorState::Running
        } else if self.enabled.load(Ordering::SeqCst) {
            MonitorState::Idle
        } else {
            MonitorState::Stopped
        }
    }

    /// Claim the pass flag. The returned guard releases it on every exit
    /// path, including panics inside a pass.
    fn begin_pass(&self) -> std::result::Result<PassGuard<'_>, NewsdeskError> {
        if self
            .pass_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NewsdeskError::PassInProgress);
        }
        Ok(PassGuard(self))
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

struct PassGuard<'a>(&'a Monitor);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.pass_running.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceOutcome {
    pub source_name: String,
    pub url: String,
    pub new_articles: u32,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct IngestReport {
    pub session_id: Uuid,
    pub manual: bool,
    pub outcomes: Vec<SourceOutcome>,
    pub duplicates: u32,
    pub skipped_articles: u32,
}

impl IngestReport {
    fn new(session_id: Uuid, manual: bool) -> Self {
        Self {
            session_id,
            manual,
            outcomes: Vec::new(),
            duplicates: 0,
            skipped_articles: 0,
        }
    }

    pub fn new_article_total(&self) -> u32 {
        self.outcomes.iter().map(|o| o.new_articles).sum()
    }
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let failed = self.outcomes.iter().filter(|o| !o.success).count();
        writeln!(f, "\n=== Ingestion Pass Complete ===")?;
        writeln!(f, "Sources processed: {}", self.outcomes.len())?;
        writeln!(f, "Sources failed:    {failed}")?;
        writeln!(f, "New articles:      {}", self.new_article_total())?;
        writeln!(f, "Duplicates:        {}", self.duplicates)?;
        writeln!(f, "Articles skipped:  {}", self.skipped_articles)?;
        for outcome in self.outcomes.iter().filter(|o| !o.success) {
            writeln!(
                f,
                "  failed: {} ({}) — {}",
                outcome.source_name,
                outcome.url,
                outcome.error.as_deref().unwrap_or("unknown error")
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SourceStats {
    new_articles: u32,
    duplicates: u32,
    skipped: u32,
}

enum ItemOutcome {
    Inserted,
    Duplicate,
    Skipped(&'static str),
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

pub struct Ingestor {
    store: Arc<dyn ArticleStore>,
    discovery: FeedDiscovery,
    pipeline: ExtractionPipeline,
    dedup: DedupGuard,
    scraper: SiteScraper,
    governor: ResourceGovernor,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Option<Arc<dyn ArticleExtractor>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    monitor: Arc<Monitor>,
    check_interval: Duration,
}

impl Ingestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ArticleStore>,
        fetcher: Arc<dyn PageFetcher>,
        scraper: SiteScraper,
        governor: ResourceGovernor,
        extractor: Option<Arc<dyn ArticleExtractor>>,
        summarizer: Option<Arc<dyn Summarizer>>,
        monitor: Arc<Monitor>,
        check_interval: Duration,
    ) -> Self {
        Self {
            store: store.clone(),
            discovery: FeedDiscovery::new(fetcher.clone()),
            pipeline: ExtractionPipeline::new(fetcher.clone()),
            dedup: DedupGuard::new(store),
            scraper,
            governor,
            fetcher,
            extractor,
            summarizer,
            monitor,
            check_interval,
        }
    }

    /// Wire up the real collaborators from environment configuration.
    pub fn from_config(store: Arc<dyn ArticleStore>, config: &Config) -> Self {
        let fetcher: Arc<dyn PageFetcher> =
            Arc::new(RateLimitedFetcher::new(fetcher::DEFAULT_TIMEOUT));

        let browserless = config
            .browserless_url
            .as_deref()
            .map(|u| browserless_client::BrowserlessClient::new(u, config.browserless_token.as_deref()));
        let scraper = SiteScraper::new(fetcher.clone(), browserless);

        let extractor: Option<Arc<dyn ArticleExtractor>> = config
            .adk_url
            .as_deref()
            .map(|u| {
                Arc::new(adk_client::AdkClient::new(u, config.adk_api_key.as_deref()))
                    as Arc<dyn ArticleExtractor>
            });

        Self::new(
            store,
            fetcher,
            scraper,
            ResourceGovernor::new(Box::new(ProcMemorySampler)),
            extractor,
            None,
            Arc::new(Monitor::new()),
            Duration::from_secs(config.check_interval_minutes * 60),
        )
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        self.monitor.clone()
    }

    // --- Exposed operations ---

    /// Find a verified feed URL for a site.
    pub async fn discover_feed_url(&self, site_url: &str) -> Option<String> {
        self.discovery.discover(site_url).await
    }

    /// Fetch a URL and check whether it serves feed content.
    pub async fn validate_feed(&self, feed_url: &str) -> bool {
        match self
            .fetcher
            .fetch_with_timeout(feed_url, FEED_FETCH_TIMEOUT)
            .await
        {
            Ok(page) if (200..300).contains(&page.status) => feed::is_feed_content(&page.body),
            _ => false,
        }
    }

    /// Extract article metadata straight from a page URL.
    pub async fn extract_article_metadata(&self, page_url: &str) -> Result<PageMetadata> {
        self.pipeline.page_metadata(page_url, Utc::now()).await
    }

    /// Retry date extraction for recent date-less articles.
    pub async fn enrich_missing_dates(&self, limit: usize) -> Result<usize> {
        enrich::enrich_missing_dates(self.store.as_ref(), &self.pipeline, limit, Utc::now()).await
    }

    /// Periodic loop: one pass per interval while the monitor is started.
    /// An in-flight pass is never interrupted; a stopped monitor skips
    /// ticks without exiting the loop.
    pub async fn run_periodic(&self) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; consume it

        loop {
            ticker.tick().await;
            if self.monitor.state() == MonitorState::Stopped {
                debug!("Monitoring stopped, skipping scheduled pass");
                continue;
            }
            match self.run_pass(false).await {
                Ok(_) => {}
                Err(NewsdeskError::PassInProgress) => {
                    info!("Previous pass still running, skipping tick");
                }
                Err(e) => warn!(error = %e, "Scheduled pass failed"),
            }
        }
    }

    /// Run one full ingestion pass over all active sources. Exactly one
    /// pass runs at a time; a second caller gets `PassInProgress`.
    pub async fn run_pass(
        &self,
        manual: bool,
    ) -> std::result::Result<IngestReport, NewsdeskError> {
        let _guard = self.monitor.begin_pass()?;

        let session_id = Uuid::new_v4();
        info!(manual, session_id = %session_id, "Ingestion pass starting");

        let sources = self
            .store
            .list_sources()
            .await
            .map_err(|e| NewsdeskError::Store(e.to_string()))?;

        let mut report = IngestReport::new(session_id, manual);
        for source in &sources {
            if source.paused {
                debug!(source = source.name.as_str(), "Source paused, skipping");
                continue;
            }

            match self.process_source(source, session_id).await {
                Ok(stats) => {
                    info!(
                        source = source.name.as_str(),
                        new_articles = stats.new_articles,
                        duplicates = stats.duplicates,
                        skipped = stats.skipped,
                        "Source processed"
                    );
                    report.duplicates += stats.duplicates;
                    report.skipped_articles += stats.skipped;
                    report.outcomes.push(SourceOutcome {
                        source_name: source.name.clone(),
                        url: source.url.clone(),
                        new_articles: stats.new_articles,
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(source = source.name.as_str(), url = source.url.as_str(), error = %e, "Source failed");
                    report.outcomes.push(SourceOutcome {
                        source_name: source.name.clone(),
                        url: source.url.clone(),
                        new_articles: 0,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }

            if let Err(e) = self
                .store
                .update_source_last_checked(source.id, Utc::now())
                .await
            {
                warn!(source = source.name.as_str(), error = %e, "Failed to update last-checked");
            }
        }

        info!("{report}");
        Ok(report)
    }

    // --- Per-source processing ---

    async fn process_source(&self, source: &Source, session: Uuid) -> Result<SourceStats> {
        match source.monitoring {
            MonitoringType::Rss => self.process_feed_source(source, session).await,
            MonitoringType::Adk => self.process_adk_source(source, session).await,
            MonitoringType::Scraping => self.process_scraped_source(source, session).await,
        }
    }

    /// RSS sources store the feed URL itself; parse it directly, no
    /// re-discovery.
    async fn process_feed_source(&self, source: &Source, session: Uuid) -> Result<SourceStats> {
        let page = self
            .fetcher
            .fetch_with_timeout(&source.url, FEED_FETCH_TIMEOUT)
            .await
            .with_context(|| format!("Feed fetch failed for {}", source.url))?;
        let items = feed::parse_feed(&page.body)?;
        let items = feed::most_recent(items, feed::FEED_ITEM_CAP, Utc::now());

        Ok(self.process_items(source, &items, session).await)
    }

    /// ADK sources ask the agent extractor first; zero usable articles or a
    /// fully foreign-domain result set falls back to traditional scraping.
    async fn process_adk_source(&self, source: &Source, session: Uuid) -> Result<SourceStats> {
        let extracted = match &self.extractor {
            Some(extractor) => match extractor.extract_articles(source).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(source = source.name.as_str(), error = %e, "Agent extraction failed, falling back to scrape");
                    return self.process_scraped_source(source, session).await;
                }
            },
            None => {
                debug!(source = source.name.as_str(), "No agent extractor configured, scraping directly");
                return self.process_scraped_source(source, session).await;
            }
        };

        // The extractor is untrusted: keep only items whose link belongs to
        // the source's own domain. A partially mismatched batch keeps its
        // matching subset; an entirely unusable one triggers the fallback.
        let total = extracted.len();
        let kept: Vec<RawItem> = extracted
            .into_iter()
            .filter(|item| {
                item.link
                    .as_deref()
                    .is_some_and(|l| domain_matches(&source.url, l))
            })
            .collect();
        let discarded = total - kept.len();
        if discarded > 0 {
            warn!(
                source = source.name.as_str(),
                discarded,
                kept = kept.len(),
                "Agent extractor returned foreign-domain articles"
            );
        }

        if kept.is_empty() {
            info!(source = source.name.as_str(), "Agent extraction yielded nothing usable, falling back to scrape");
            return self.process_scraped_source(source, session).await;
        }

        Ok(self.process_items(source, &kept, session).await)
    }

    async fn process_scraped_source(&self, source: &Source, session: Uuid) -> Result<SourceStats> {
        let allow_browser = self.governor.should_attempt_scraping(source);
        if !allow_browser && source.monitoring != MonitoringType::Rss {
            // Memory-gated: skip this cycle entirely, the next pass retries.
            info!(source = source.name.as_str(), "Scrape skipped this cycle");
            return Ok(SourceStats::default());
        }

        if let Some(delay) = self.governor.pre_scrape_delay() {
            tokio::time::sleep(delay).await;
        }

        let page = self.scraper.page_html(&source.url, allow_browser).await?;
        let items = items_from_listing(&page.html, &source.url);
        debug!(source = source.name.as_str(), candidates = items.len(), "Listing scraped");

        let stats = self.process_items(source, &items, session).await;

        if page.used_browser {
            self.governor.after_browser_use().await;
        }

        Ok(stats)
    }

    /// Process raw items in small batches. A bad article skips that article
    /// only; the batch and source carry on.
    async fn process_items(
        &self,
        source: &Source,
        items: &[RawItem],
        session: Uuid,
    ) -> SourceStats {
        let mut stats = SourceStats::default();

        let mut batches = items.chunks(ARTICLE_BATCH_SIZE).peekable();
        while let Some(batch) = batches.next() {
            for item in batch {
                match self.process_item(source, item, session).await {
                    ItemOutcome::Inserted => stats.new_articles += 1,
                    ItemOutcome::Duplicate => stats.duplicates += 1,
                    ItemOutcome::Skipped(reason) => {
                        debug!(
                            source = source.name.as_str(),
                            link = item.link.as_deref().unwrap_or("<none>"),
                            reason,
                            "Article skipped"
                        );
                        stats.skipped += 1;
                    }
                }
            }
            if batches.peek().is_some() {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
        }

        stats
    }

    async fn process_item(&self, source: &Source, item: &RawItem, session: Uuid) -> ItemOutcome {
        let Some(link) = item.link.as_deref() else {
            return ItemOutcome::Skipped("no link");
        };
        if !link.starts_with("http") {
            return ItemOutcome::Skipped("bad link");
        }

        // Fail fast before any fetching or extraction work.
        if !self.dedup.should_ingest(link).await {
            return ItemOutcome::Duplicate;
        }

        let draft = match self.pipeline.article_fields(item, Utc::now()).await {
            Ok(draft) => draft,
            Err(e) => {
                debug!(link, error = %e, "Extraction failed");
                return ItemOutcome::Skipped("extraction failed");
            }
        };

        if title::is_error_page_title(&draft.title) {
            return ItemOutcome::Skipped("error page title");
        }
        if draft.content.trim().is_empty() {
            return ItemOutcome::Skipped("no content");
        }
        if source.monitoring != MonitoringType::Rss
            && draft.content.chars().count() < MIN_SCRAPED_CONTENT
        {
            return ItemOutcome::Skipped("insufficient content");
        }

        // The summarizer only sweetens the preview; its failures never block
        // the article.
        let description = match &self.summarizer {
            Some(summarizer) => {
                match summarizer
                    .summarize(&draft.title, &draft.content, &source.name)
                    .await
                {
                    Ok(text) if !text.trim().is_empty() => preview::truncate_preview(&text),
                    Ok(_) => draft.description.clone(),
                    Err(e) => {
                        warn!(link, error = %e, "Summarizer failed, keeping heuristic preview");
                        draft.description.clone()
                    }
                }
            }
            None => draft.description.clone(),
        };

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: draft.title,
            content: draft.content,
            description,
            link: draft.link,
            pub_date: draft.pub_date,
            source_id: source.id,
            source_name: source.name.clone(),
            category: source.category.clone(),
            status: ArticleStatus::New,
            seen: false,
            session_id: Some(session),
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_article(&article).await {
            Ok(_) => ItemOutcome::Inserted,
            Err(StoreError::DuplicateLink(_)) => {
                // Lost a race with another ingestion path; that's a dedup
                // success, not a failure.
                debug!(link = article.link.as_str(), "Insert hit existing link");
                ItemOutcome::Duplicate
            }
            Err(StoreError::Backend(e)) => {
                warn!(link = article.link.as_str(), error = %e, "Insert failed");
                ItemOutcome::Skipped("store error")
            }
        }
    }
}

/// Host comparison for extractor output: `www.` prefixes are ignored and
/// subdomains of the source host count as matching.
fn domain_matches(source_url: &str, link: &str) -> bool {
    fn host(url: &str) -> Option<String> {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .map(|h| h.trim_start_matches("www.").to_string())
    }

    match (host(source_url), host(link)) {
        (Some(a), Some(b)) => a == b || b.ends_with(&format!(".{a}")) || a.ends_with(&format!(".{b}")),
        _ => false,
    }
}
