// Traditional DOM scraping for sources without a feed.
//
// All page HTML for scraped sources flows through SiteScraper::page_html,
// the one place that decides browser render vs. static fetch and that keeps
// the render scoped to the call, so no code path can leak a browser page.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use browserless_client::BrowserlessClient;
use newsdesk_common::RawItem;

use crate::traits::PageFetcher;

const STATIC_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Listing pages yield at most this many article candidates per pass.
const MAX_LISTING_LINKS: usize = 20;

#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
    fn name(&self) -> &str;
}

/// Renderer backed by the Browserless service. One render request is one
/// scoped browser page server-side.
pub struct BrowserlessRenderer {
    client: BrowserlessClient,
}

impl BrowserlessRenderer {
    pub fn new(client: BrowserlessClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for BrowserlessRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let html = self
            .client
            .content(url)
            .await
            .context("Browserless content request failed")?;
        if html.trim().is_empty() {
            warn!(url, renderer = "browserless", "Empty HTML from render");
        }
        Ok(html)
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

/// A fetched page plus how it was obtained; callers owe a governor cooldown
/// when `used_browser` is set.
pub struct RenderedPage {
    pub html: String,
    pub used_browser: bool,
}

pub struct SiteScraper {
    browser: Option<Box<dyn PageRenderer>>,
    fetcher: Arc<dyn PageFetcher>,
}

impl SiteScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>, browser: Option<BrowserlessClient>) -> Self {
        Self {
            browser: browser
                .map(|c| Box::new(BrowserlessRenderer::new(c)) as Box<dyn PageRenderer>),
            fetcher,
        }
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn with_renderer(
        fetcher: Arc<dyn PageFetcher>,
        renderer: Box<dyn PageRenderer>,
    ) -> Self {
        Self {
            browser: Some(renderer),
            fetcher,
        }
    }

    /// Fetch page HTML, preferring a browser render when allowed and
    /// available, falling back to a static fetch when rendering is
    /// unavailable or fails.
    pub async fn page_html(&self, url: &str, allow_browser: bool) -> Result<RenderedPage> {
        if allow_browser {
            if let Some(browser) = &self.browser {
                match browser.render(url).await {
                    Ok(html) if !html.trim().is_empty() => {
                        return Ok(RenderedPage {
                            html,
                            used_browser: true,
                        });
                    }
                    Ok(_) => {
                        debug!(url, "Render produced empty DOM, falling back to static fetch");
                    }
                    Err(e) => {
                        warn!(url, error = %e, "Render failed, falling back to static fetch");
                    }
                }
            }
        }

        let page = self
            .fetcher
            .fetch_with_timeout(url, STATIC_FETCH_TIMEOUT)
            .await
            .with_context(|| format!("Static fetch failed for {url}"))?;
        Ok(RenderedPage {
            html: page.text(),
            used_browser: false,
        })
    }
}

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
        .expect("valid anchor regex")
});
static INNER_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid inner-tag regex"));

/// Harvest same-host article candidates from a listing/blog page. Anchor
/// text rides along as the provisional title.
pub fn items_from_listing(html: &str, base_url: &str) -> Vec<RawItem> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let host = base.host_str().unwrap_or_default().to_lowercase();

    let mut seen = std::collections::HashSet::new();
    let mut items = Vec::new();

    for cap in ANCHOR_RE.captures_iter(html) {
        let href = cap[1].trim();
        let Some(resolved) = resolve(href, &base) else { continue };

        if resolved.host_str().map(|h| h.to_lowercase()).as_deref() != Some(host.as_str()) {
            continue;
        }
        if !looks_like_article_path(resolved.path()) {
            continue;
        }

        let link = {
            let mut u = resolved.clone();
            u.set_fragment(None);
            u.to_string()
        };
        if !seen.insert(link.clone()) {
            continue;
        }

        let text = INNER_TAG_RE.replace_all(&cap[2], " ");
        let title = text.split_whitespace().collect::<Vec<_>>().join(" ");

        items.push(RawItem {
            link: Some(link),
            title: (title.chars().count() >= 8).then_some(title),
            ..RawItem::default()
        });

        if items.len() >= MAX_LISTING_LINKS {
            break;
        }
    }

    items
}

fn resolve(href: &str, base: &Url) -> Option<Url> {
    if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        Url::parse(href).ok()
    } else {
        base.join(href).ok()
    }
}

/// Article-shaped paths: dated archives or hyphenated slugs, not nav pages.
fn looks_like_article_path(path: &str) -> bool {
    static YEAR_SEGMENT_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"/20\d{2}/").expect("valid year regex"));
    const EXCLUDED: &[&str] = &[
        "/tag/", "/tags/", "/category/", "/categories/", "/author/", "/page/",
        "/about", "/contact", "/privacy", "/terms", "/login", "/signup",
        "/search", "/subscribe", "/cart", "/feed", "/rss",
    ];

    let lower = path.to_lowercase();
    if EXCLUDED.iter().any(|e| lower.contains(e)) {
        return false;
    }
    if lower.ends_with(".jpg")
        || lower.ends_with(".png")
        || lower.ends_with(".pdf")
        || lower.ends_with(".xml")
    {
        return false;
    }

    if YEAR_SEGMENT_RE.is_match(&lower) {
        return true;
    }

    // Slug heuristic: a final segment with at least two hyphens reads like
    // a headline.
    let last = lower.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    last.matches('-').count() >= 2 && last.len() >= 12
}
