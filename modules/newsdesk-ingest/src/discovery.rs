// Feed discovery: given a site URL, find one working feed URL.
//
// Strategies run in a fixed order and short-circuit on the first candidate
// that fetches AND passes the content sniff; discovery never returns an
// unverified URL. Results, including "nothing found", are cached per
// normalized site URL so repeated probing of dead ends stays cheap.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::feed::is_feed_content;
use crate::traits::PageFetcher;

/// Cached discovery results expire after this long.
const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Budget for one candidate probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Budget for fetching site HTML / sitemaps.
const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on conventional-path probes per strategy run.
const MAX_PATH_PROBES: usize = 30;

/// Conventional feed locations, highest-yield first.
const COMMON_FEED_PATHS: &[&str] = &[
    "/feed",
    "/rss",
    "/feed.xml",
    "/rss.xml",
    "/atom.xml",
    "/feeds/all.xml",
    "/index.xml",
    "/feed/",
    "/rss/",
    "/feed.rss",
    "/feed.atom",
    "/atom",
    "/rss.aspx",
    "/feed.aspx",
    "/feeds",
    "/feeds/default",
    "/feeds/rss.xml",
    "/feeds/feed.xml",
    "/blog/feed",
    "/blog/rss",
    "/blog/feed.xml",
    "/blog/rss.xml",
    "/blog/atom.xml",
    "/blog/index.xml",
    "/news/feed",
    "/news/rss",
    "/news/rss.xml",
    "/articles/feed",
    "/posts/feed",
    "/posts/index.xml",
    "/updates/feed",
    "/rss/news.xml",
    "/rss/all.xml",
    "/en/feed",
    "/latest/feed",
    "/feed/rss2",
];

/// Section prefixes probed in combination with the conventional paths.
const SECTION_PREFIXES: &[&str] = &["", "/blog", "/news", "/posts", "/articles", "/updates"];

struct CacheEntry {
    found: Option<String>,
    at: Instant,
}

type StrategyFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
type Strategy = for<'a> fn(&'a FeedDiscovery, &'a Url) -> StrategyFuture<'a>;

/// Ordered strategy chain. Each entry is independently testable; reordering
/// the table reorders discovery.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("html-link", strategy_html_links),
    ("parent-html-link", strategy_parent_html_links),
    ("common-paths", strategy_common_paths),
    ("platform", strategy_platform_probes),
    ("wordpress", strategy_wordpress_probes),
    ("sitemap", strategy_sitemap),
];

fn strategy_html_links<'a>(d: &'a FeedDiscovery, u: &'a Url) -> StrategyFuture<'a> {
    Box::pin(d.from_html_links(u))
}
fn strategy_parent_html_links<'a>(d: &'a FeedDiscovery, u: &'a Url) -> StrategyFuture<'a> {
    Box::pin(d.from_parent_html_links(u))
}
fn strategy_common_paths<'a>(d: &'a FeedDiscovery, u: &'a Url) -> StrategyFuture<'a> {
    Box::pin(d.from_common_paths(u))
}
fn strategy_platform_probes<'a>(d: &'a FeedDiscovery, u: &'a Url) -> StrategyFuture<'a> {
    Box::pin(d.from_platform_probes(u))
}
fn strategy_wordpress_probes<'a>(d: &'a FeedDiscovery, u: &'a Url) -> StrategyFuture<'a> {
    Box::pin(d.from_wordpress_probes(u))
}
fn strategy_sitemap<'a>(d: &'a FeedDiscovery, u: &'a Url) -> StrategyFuture<'a> {
    Box::pin(d.from_sitemap(u))
}

pub struct FeedDiscovery {
    fetcher: Arc<dyn PageFetcher>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl FeedDiscovery {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Find a verified feed URL for a site, or None. Negative results are
    /// cached as firmly as positive ones.
    pub async fn discover(&self, site_url: &str) -> Option<String> {
        let Some(url) = parse_site_url(site_url) else {
            warn!(site_url, "Unparsable site URL, skipping discovery");
            return None;
        };
        let key = normalize_base_url(&url);

        if let Some(cached) = self.cached(&key) {
            debug!(site = key.as_str(), "Discovery cache hit");
            return cached;
        }

        let mut result = None;
        for (name, strategy) in STRATEGIES {
            if let Some(feed) = strategy(self, &url).await {
                info!(site = key.as_str(), strategy = *name, feed = feed.as_str(), "Feed discovered");
                result = Some(feed);
                break;
            }
            debug!(site = key.as_str(), strategy = *name, "No feed via strategy");
        }

        if result.is_none() {
            info!(site = key.as_str(), "No feed found for site");
        }

        let mut cache = self.cache.lock().expect("discovery cache poisoned");
        cache.insert(
            key,
            CacheEntry {
                found: result.clone(),
                at: Instant::now(),
            },
        );

        result
    }

    fn cached(&self, key: &str) -> Option<Option<String>> {
        let cache = self.cache.lock().expect("discovery cache poisoned");
        cache
            .get(key)
            .filter(|e| e.at.elapsed() < CACHE_TTL)
            .map(|e| e.found.clone())
    }

    // --- Strategies ---

    /// (1) `<link rel="alternate">` tags and feed-looking anchors on the
    /// site page itself.
    async fn from_html_links(&self, url: &Url) -> Option<String> {
        let html = self.fetch_text(url.as_str(), PAGE_TIMEOUT).await?;
        self.first_valid(feed_candidates_in_html(&html, url)).await
    }

    /// (2) The same HTML signal on same-origin parent paths.
    async fn from_parent_html_links(&self, url: &Url) -> Option<String> {
        for parent in parent_paths(url) {
            let Some(html) = self.fetch_text(parent.as_str(), PAGE_TIMEOUT).await else {
                continue;
            };
            if let Some(feed) = self.first_valid(feed_candidates_in_html(&html, &parent)).await {
                return Some(feed);
            }
        }
        None
    }

    /// (3) Conventional feed paths probed against section prefixes and
    /// parent paths, highest-priority path first.
    async fn from_common_paths(&self, url: &Url) -> Option<String> {
        let origin = origin_of(url);
        let mut bases: Vec<String> = SECTION_PREFIXES
            .iter()
            .map(|p| format!("{origin}{p}"))
            .collect();
        for parent in parent_paths(url) {
            let base = normalize_base_url(&parent);
            if !bases.contains(&base) {
                bases.push(base);
            }
        }

        let mut probes = 0usize;
        for path in COMMON_FEED_PATHS {
            for base in &bases {
                if probes >= MAX_PATH_PROBES {
                    debug!(site = origin.as_str(), "Conventional-path probe budget exhausted");
                    return None;
                }
                probes += 1;
                if let Some(feed) = self.validated(&format!("{base}{path}")).await {
                    return Some(feed);
                }
            }
        }
        None
    }

    /// (4) Platform-specific feed conventions.
    async fn from_platform_probes(&self, url: &Url) -> Option<String> {
        for candidate in platform_candidates(url) {
            if let Some(feed) = self.validated(&candidate).await {
                return Some(feed);
            }
        }
        None
    }

    /// (5) WordPress conventions, only when the URL signals WordPress.
    async fn from_wordpress_probes(&self, url: &Url) -> Option<String> {
        if !signals_wordpress(url) {
            return None;
        }
        let origin = origin_of(url);
        for path in ["/feed", "/?feed=rss2", "/comments/feed", "/feed/rss2"] {
            if let Some(feed) = self.validated(&format!("{origin}{path}")).await {
                return Some(feed);
            }
        }
        None
    }

    /// (6) Mine /sitemap.xml for feed-looking URLs and likely content
    /// sections, probing the sections with the conventional paths.
    async fn from_sitemap(&self, url: &Url) -> Option<String> {
        let origin = origin_of(url);
        let xml = self
            .fetch_text(&format!("{origin}/sitemap.xml"), PAGE_TIMEOUT)
            .await?;
        let (feed_urls, sections) = sitemap_candidates(&xml);

        if let Some(feed) = self.first_valid(feed_urls).await {
            return Some(feed);
        }

        for section in sections.into_iter().take(5) {
            for path in COMMON_FEED_PATHS.iter().take(6) {
                if let Some(feed) = self.validated(&format!("{section}{path}")).await {
                    return Some(feed);
                }
            }
        }
        None
    }

    // --- Probe helpers ---

    async fn fetch_text(&self, url: &str, timeout: Duration) -> Option<String> {
        match self.fetcher.fetch_with_timeout(url, timeout).await {
            Ok(page) if (200..300).contains(&page.status) => Some(page.text()),
            Ok(page) => {
                debug!(url, status = page.status, "Non-success fetching page");
                None
            }
            Err(e) => {
                debug!(url, error = %e, "Failed to fetch page");
                None
            }
        }
    }

    /// Fetch a candidate and accept it only if the body sniffs as a feed.
    /// Returns the post-redirect URL so the stored feed URL is canonical.
    async fn validated(&self, candidate: &str) -> Option<String> {
        match self.fetcher.fetch_with_timeout(candidate, PROBE_TIMEOUT).await {
            Ok(page) if (200..300).contains(&page.status) && is_feed_content(&page.body) => {
                Some(page.url)
            }
            _ => None,
        }
    }

    async fn first_valid(&self, candidates: Vec<String>) -> Option<String> {
        for candidate in candidates {
            if let Some(feed) = self.validated(&candidate).await {
                return Some(feed);
            }
        }
        None
    }
}

// --- Pure helpers (unit-tested without I/O) ---

/// Accepts bare domains as well as full URLs.
pub fn parse_site_url(site_url: &str) -> Option<Url> {
    let trimmed = site_url.trim();
    Url::parse(trimmed)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{trimmed}")).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

/// Cache key / canonical site form: scheme + lowercase host + path, with
/// query, fragment, and trailing slash dropped.
pub fn normalize_base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let port = url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    format!("{}://{host}{port}{path}", url.scheme())
}

fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let port = url
        .port()
        .map(|p| format!(":{p}"))
        .unwrap_or_default();
    format!("{}://{host}{port}", url.scheme())
}

/// Same-origin ancestors of the URL path, nearest first, origin last.
pub fn parent_paths(url: &Url) -> Vec<Url> {
    let mut parents = Vec::new();
    let mut current = url.clone();
    current.set_query(None);
    current.set_fragment(None);

    loop {
        let path = current.path().trim_end_matches('/').to_string();
        if path.is_empty() {
            break;
        }
        let parent_path = match path.rfind('/') {
            Some(0) | None => String::new(),
            Some(idx) => path[..idx].to_string(),
        };
        let mut parent = current.clone();
        parent.set_path(if parent_path.is_empty() { "/" } else { &parent_path });
        parents.push(parent.clone());
        current = parent;
        if parent_path.is_empty() {
            break;
        }
    }

    parents
}

static LINK_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid link-tag regex"));
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("valid anchor regex")
});
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("valid href regex"));

/// Harvest feed candidates from page HTML: `<link rel="alternate">` tags
/// with a feed content type, then anchors whose href looks like a feed.
/// Relative URLs resolve against `base`; order is preserved, duplicates
/// dropped.
pub fn feed_candidates_in_html(html: &str, base: &Url) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();

    for tag in LINK_TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        let lower = tag.to_lowercase();
        if !lower.contains("alternate") {
            continue;
        }
        let is_feed_type = lower.contains("application/rss+xml")
            || lower.contains("application/atom+xml")
            || lower.contains("application/feed+json")
            || lower.contains("application/json");
        if !is_feed_type {
            continue;
        }
        if let Some(href) = HREF_RE.captures(tag).and_then(|c| c.get(1)) {
            if let Some(resolved) = resolve_href(href.as_str(), base) {
                if seen.insert(resolved.clone()) {
                    candidates.push(resolved);
                }
            }
        }
    }

    for cap in ANCHOR_RE.captures_iter(html) {
        let href = &cap[1];
        if !looks_like_feed_href(href) {
            continue;
        }
        if let Some(resolved) = resolve_href(href, base) {
            if seen.insert(resolved.clone()) {
                candidates.push(resolved);
            }
        }
    }

    candidates
}

fn resolve_href(href: &str, base: &Url) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn looks_like_feed_href(href: &str) -> bool {
    let lower = href.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    path.ends_with("/feed")
        || path.ends_with("/feed/")
        || path.ends_with("/rss")
        || path.ends_with("/rss/")
        || path.ends_with(".rss")
        || (path.ends_with(".xml")
            && (path.contains("rss") || path.contains("atom") || path.contains("feed")))
}

/// Platform-specific feed candidates. When the host matches a known
/// platform, only that platform's conventions are probed; otherwise a small
/// low-priority catch-all list is returned.
pub fn platform_candidates(url: &Url) -> Vec<String> {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let origin = origin_of(url);
    let path = url.path().trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if host.ends_with(".substack.com") || host == "substack.com" {
        return vec![format!("{origin}/feed")];
    }
    if host == "medium.com" || host.ends_with(".medium.com") {
        if let Some(first) = segments.first() {
            return vec![format!("{origin}/feed/{first}")];
        }
        return vec![format!("{origin}/feed")];
    }
    if host.contains("youtube.com") {
        if segments.len() >= 2 && segments[0] == "channel" {
            return vec![format!(
                "https://www.youtube.com/feeds/videos.xml?channel_id={}",
                segments[1]
            )];
        }
        if segments.len() >= 2 && segments[0] == "user" {
            return vec![format!(
                "https://www.youtube.com/feeds/videos.xml?user={}",
                segments[1]
            )];
        }
        return Vec::new();
    }
    if host.contains("reddit.com") {
        let base = normalize_base_url(url);
        return vec![format!("{base}/.rss")];
    }
    if host == "github.com" {
        if segments.len() >= 2 {
            let (owner, repo) = (segments[0], segments[1]);
            return vec![
                format!("https://github.com/{owner}/{repo}/releases.atom"),
                format!("https://github.com/{owner}/{repo}/commits.atom"),
            ];
        }
        if let Some(owner) = segments.first() {
            return vec![format!("https://github.com/{owner}.atom")];
        }
        return Vec::new();
    }
    if host.ends_with(".blogspot.com") {
        return vec![
            format!("{origin}/feeds/posts/default?alt=rss"),
            format!("{origin}/feeds/posts/default"),
        ];
    }
    if host.ends_with(".tumblr.com") {
        return vec![format!("{origin}/rss")];
    }
    if segments.first().is_some_and(|s| s.starts_with('@')) {
        // Mastodon-style actor URL.
        return vec![format!("{origin}{path}.rss")];
    }

    // Catch-all: platform conventions occasionally adopted elsewhere.
    vec![
        format!("{origin}/.rss"),
        format!("{origin}/feeds/posts/default"),
        format!("{origin}/rss"),
    ]
}

fn signals_wordpress(url: &Url) -> bool {
    let s = url.as_str().to_lowercase();
    s.contains("/wp-content") || s.contains("/wp-json") || s.contains("wp-includes") || s.contains("wordpress")
}

static LOC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<loc>\s*([^<]+?)\s*</loc>").expect("valid loc regex"));

/// Split sitemap `<loc>` entries into directly-probeable feed URLs and
/// content-section URLs worth probing with the conventional paths.
pub fn sitemap_candidates(xml: &str) -> (Vec<String>, Vec<String>) {
    const SECTION_HINTS: &[&str] = &["blog", "news", "posts", "articles", "updates"];

    let mut feeds = Vec::new();
    let mut sections = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for cap in LOC_RE.captures_iter(xml) {
        let loc = cap[1].trim().to_string();
        if !seen.insert(loc.clone()) {
            continue;
        }
        let lower = loc.to_lowercase();
        if looks_like_feed_href(&lower) {
            feeds.push(loc);
            continue;
        }
        let Ok(parsed) = Url::parse(&loc) else { continue };
        let path = parsed.path().to_lowercase();
        // Shallow section pages only; deep article URLs make poor probe bases.
        let depth = path.split('/').filter(|s| !s.is_empty()).count();
        if depth <= 2 && SECTION_HINTS.iter().any(|h| path.contains(h)) {
            sections.push(loc.trim_end_matches('/').to_string());
        }
    }

    (feeds, sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn parses_bare_domains() {
        let u = parse_site_url("example.com").unwrap();
        assert_eq!(u.as_str(), "https://example.com/");
        assert!(parse_site_url("https://example.com/blog").is_some());
        assert!(parse_site_url("not a url at all").is_none());
    }

    #[test]
    fn normalizes_base_urls() {
        assert_eq!(
            normalize_base_url(&url("HTTPS://Example.COM/Blog/?utm=1#top")),
            "https://example.com/Blog"
        );
        assert_eq!(
            normalize_base_url(&url("http://example.com/")),
            "http://example.com"
        );
    }

    #[test]
    fn walks_parent_paths_to_origin() {
        let parents = parent_paths(&url("https://example.com/a/b/c"));
        let rendered: Vec<String> = parents.iter().map(|u| u.as_str().to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "https://example.com/a/b",
                "https://example.com/a",
                "https://example.com/",
            ]
        );
    }

    #[test]
    fn finds_rel_alternate_links_any_attribute_order() {
        let base = url("https://example.com/");
        let html = r#"<head>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            <link href="https://example.com/atom.xml" type="application/atom+xml" rel="alternate"/>
            <link rel="stylesheet" href="/style.css">
        </head>"#;
        let found = feed_candidates_in_html(html, &base);
        assert_eq!(
            found,
            vec![
                "https://example.com/feed.xml",
                "https://example.com/atom.xml",
            ]
        );
    }

    #[test]
    fn finds_feed_anchors_but_not_page_links() {
        let base = url("https://example.com/");
        let html = r#"
            <a href="/blog/feed">Subscribe</a>
            <a href="/about">About</a>
            <a href="/sitemap.xml">Sitemap</a>
            <a href="/podcast.rss">Podcast</a>
        "#;
        let found = feed_candidates_in_html(html, &base);
        assert_eq!(
            found,
            vec![
                "https://example.com/blog/feed",
                "https://example.com/podcast.rss",
            ]
        );
    }

    #[test]
    fn platform_probes_match_known_hosts() {
        assert_eq!(
            platform_candidates(&url("https://writer.substack.com/p/post")),
            vec!["https://writer.substack.com/feed"]
        );
        assert_eq!(
            platform_candidates(&url("https://medium.com/@someone")),
            vec!["https://medium.com/feed/@someone"]
        );
        assert_eq!(
            platform_candidates(&url("https://www.youtube.com/channel/UCabc123")),
            vec!["https://www.youtube.com/feeds/videos.xml?channel_id=UCabc123"]
        );
        assert_eq!(
            platform_candidates(&url("https://www.reddit.com/r/rust/")),
            vec!["https://www.reddit.com/r/rust/.rss"]
        );
        assert_eq!(
            platform_candidates(&url("https://github.com/acme/widget")),
            vec![
                "https://github.com/acme/widget/releases.atom",
                "https://github.com/acme/widget/commits.atom",
            ]
        );
        assert_eq!(
            platform_candidates(&url("https://someone.blogspot.com/"))[1],
            "https://someone.blogspot.com/feeds/posts/default"
        );
        assert_eq!(
            platform_candidates(&url("https://mastodon.social/@someone")),
            vec!["https://mastodon.social/@someone.rss"]
        );
    }

    #[test]
    fn platform_probes_fall_back_to_catch_all() {
        let candidates = platform_candidates(&url("https://example.com/section"));
        assert!(candidates.contains(&"https://example.com/.rss".to_string()));
        assert!(candidates.contains(&"https://example.com/rss".to_string()));
    }

    #[test]
    fn wordpress_signal_is_url_based() {
        assert!(signals_wordpress(&url("https://example.com/wp-content/themes/x")));
        assert!(signals_wordpress(&url("https://blog.example.com/wp-json/wp/v2")));
        assert!(!signals_wordpress(&url("https://example.com/blog")));
    }

    #[test]
    fn sitemap_split_feeds_from_sections() {
        let xml = r#"<?xml version="1.0"?><urlset>
            <loc>https://example.com/feed.xml</loc>
            <loc>https://example.com/blog/</loc>
            <loc>https://example.com/news</loc>
            <loc>https://example.com/blog/2025/deep-article-title</loc>
            <loc>https://example.com/about</loc>
        </urlset>"#;
        let (feeds, sections) = sitemap_candidates(xml);
        assert_eq!(feeds, vec!["https://example.com/feed.xml"]);
        assert_eq!(
            sections,
            vec!["https://example.com/blog", "https://example.com/news"]
        );
    }
}
