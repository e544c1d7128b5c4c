// End-to-end ingestion passes over mocked sources: dedup idempotence,
// extractor fallback, and the null-date invariant.

use std::sync::Arc;
use std::time::Duration;

use newsdesk_common::MonitoringType;
use newsdesk_ingest::governor::ResourceGovernor;
use newsdesk_ingest::scrape::SiteScraper;
use newsdesk_ingest::testing::{make_source, FixedMemory, MemoryStore, MockExtractor, MockFetcher};
use newsdesk_ingest::traits::ArticleExtractor;
use newsdesk_ingest::{Ingestor, Monitor};

fn build_ingestor(
    store: Arc<MemoryStore>,
    fetcher: Arc<MockFetcher>,
    extractor: Option<Arc<dyn ArticleExtractor>>,
) -> Ingestor {
    let scraper = SiteScraper::new(fetcher.clone(), None);
    let governor = ResourceGovernor::new(Box::new(FixedMemory(Some(100 * 1024 * 1024))));
    Ingestor::new(
        store,
        fetcher,
        scraper,
        governor,
        extractor,
        None,
        Arc::new(Monitor::new()),
        Duration::from_secs(1800),
    )
}

/// A feed body with two items carrying comfortably long descriptions, so no
/// full-page fetch is needed.
fn feed_body() -> String {
    let blurb = "City officials confirmed the plan on Tuesday after a lengthy public \
comment period, with construction expected to begin early next year and wrap before \
the following winter, according to the department's published timeline and budget. \
Residents can review the full documents at the city clerk's office or online, and a \
follow-up hearing has been scheduled for the spring session.";
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Example Times</title>
<item><title>Budget approved</title><link>https://example.com/budget</link>
<description>{blurb}</description>
<pubDate>Wed, 12 Nov 2025 10:00:00 GMT</pubDate></item>
<item><title>New park opens</title><link>https://example.com/park</link>
<description>{blurb}</description>
<pubDate>Tue, 11 Nov 2025 09:00:00 GMT</pubDate></item>
</channel></rss>"#
    )
}

#[tokio::test]
async fn second_pass_over_unchanged_sources_ingests_nothing() {
    let store = Arc::new(MemoryStore::with_sources(vec![make_source(
        "Example Times",
        "https://example.com/feed.xml",
        MonitoringType::Rss,
    )]));
    let fetcher = Arc::new(MockFetcher::new().on_page("https://example.com/feed.xml", &feed_body()));
    let ingestor = build_ingestor(store.clone(), fetcher, None);

    let first = ingestor.run_pass(true).await.unwrap();
    assert_eq!(first.new_article_total(), 2);
    assert_eq!(store.article_count(), 2);

    let second = ingestor.run_pass(true).await.unwrap();
    assert_eq!(second.new_article_total(), 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(store.article_count(), 2);
}

#[tokio::test]
async fn wrong_domain_extractor_results_trigger_scrape_fallback() {
    let source = make_source("Agency Blog", "https://example.com/news", MonitoringType::Adk);
    let store = Arc::new(MemoryStore::with_sources(vec![source]));

    // Extractor reports articles from a completely different domain.
    let extractor = Arc::new(MockExtractor::new().on_source(
        "https://example.com/news",
        vec![
            newsdesk_common::RawItem::with_link("https://content-farm.example.org/story-one-here"),
            newsdesk_common::RawItem::with_link("https://content-farm.example.org/story-two-here"),
        ],
    ));

    let article_body = "<html><head><title>Council backs new budget plan | Agency</title></head>\
<body><article><h1>Council backs new budget plan</h1>\
<p>The council voted seven to two in favor of the revised budget on Tuesday evening.</p>\
<p>Funding will cover road repairs, two new shelters, and an expanded library schedule.</p>\
</article></body></html>";

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_page(
                "https://example.com/news",
                r#"<html><body>
                <a href="/news/council-backs-new-budget-plan">Council backs new budget plan</a>
                <a href="/about">About</a>
                </body></html>"#,
            )
            .on_page(
                "https://example.com/news/council-backs-new-budget-plan",
                article_body,
            ),
    );

    let ingestor = build_ingestor(store.clone(), fetcher, Some(extractor));
    let report = ingestor.run_pass(true).await.unwrap();

    assert_eq!(report.new_article_total(), 1);
    let articles = store.articles();
    assert_eq!(articles.len(), 1);
    assert_eq!(
        articles[0].link,
        "https://example.com/news/council-backs-new-budget-plan"
    );
    // The foreign-domain links were discarded, not stored.
    assert!(store.articles().iter().all(|a| !a.link.contains("content-farm")));
}

#[tokio::test]
async fn unparsable_pub_date_is_stored_as_null() {
    let feed = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Example</title>
<item><title>Undated story</title><link>https://example.com/undated</link>
<description>A description that is long enough to serve as article content for this
item without requiring any full-page fetch to supplement it, covering the announcement
in reasonable detail for reviewers to skim quickly.</description>
<pubDate>sometime last week</pubDate></item>
</channel></rss>"#;

    let store = Arc::new(MemoryStore::with_sources(vec![make_source(
        "Example",
        "https://example.com/feed.xml",
        MonitoringType::Rss,
    )]));
    let fetcher = Arc::new(MockFetcher::new().on_page("https://example.com/feed.xml", feed));
    let ingestor = build_ingestor(store.clone(), fetcher, None);

    let report = ingestor.run_pass(true).await.unwrap();
    assert_eq!(report.new_article_total(), 1);

    let articles = store.articles();
    assert_eq!(articles[0].title, "Undated story");
    assert!(articles[0].pub_date.is_none(), "unknown dates stay unknown");
}

#[tokio::test]
async fn paused_sources_are_skipped() {
    let mut source = make_source(
        "Paused Times",
        "https://example.com/feed.xml",
        MonitoringType::Rss,
    );
    source.paused = true;
    let store = Arc::new(MemoryStore::with_sources(vec![source]));
    let fetcher = Arc::new(MockFetcher::new().on_page("https://example.com/feed.xml", &feed_body()));
    let ingestor = build_ingestor(store.clone(), fetcher, None);

    let report = ingestor.run_pass(true).await.unwrap();
    assert!(report.outcomes.is_empty());
    assert_eq!(store.article_count(), 0);
}

#[tokio::test]
async fn failing_source_is_recorded_and_pass_continues() {
    let store = Arc::new(MemoryStore::with_sources(vec![
        make_source(
            "Broken Feed",
            "https://broken.example/feed.xml",
            MonitoringType::Rss,
        ),
        make_source(
            "Working Feed",
            "https://example.com/feed.xml",
            MonitoringType::Rss,
        ),
    ]));
    // Only the second source has a registered response.
    let fetcher = Arc::new(MockFetcher::new().on_page("https://example.com/feed.xml", &feed_body()));
    let ingestor = build_ingestor(store.clone(), fetcher, None);

    let report = ingestor.run_pass(true).await.unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert!(!report.outcomes[0].success);
    assert!(report.outcomes[0].error.is_some());
    assert!(report.outcomes[1].success);
    assert_eq!(report.new_article_total(), 2);
}

#[tokio::test]
async fn date_enrichment_fills_missing_dates() {
    let store = Arc::new(MemoryStore::with_sources(vec![make_source(
        "Example",
        "https://example.com/feed.xml",
        MonitoringType::Rss,
    )]));

    let feed = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Example</title>
<item><title>Dateless launch</title><link>https://example.com/launch</link>
<description>The launch announcement ran without any date metadata attached, but
the body copy below carries enough substance that no supplemental page fetch is
needed during the initial ingestion pass of this particular story. Organizers said
further details, including venue information and the full speaker list, will be
published closer to the event once logistics are finalized.</description>
</item></channel></rss>"#;

    let article_page = r#"<html><head>
<meta property="article:published_time" content="2025-11-12T08:00:00Z">
</head><body><article><p>Launch day details, now with a machine-readable date.</p></article></body></html>"#;

    let fetcher = Arc::new(
        MockFetcher::new()
            .on_page("https://example.com/feed.xml", feed)
            .on_page("https://example.com/launch", article_page),
    );
    let ingestor = build_ingestor(store.clone(), fetcher, None);

    ingestor.run_pass(true).await.unwrap();
    assert!(store.articles()[0].pub_date.is_none());

    let enriched = ingestor.enrich_missing_dates(10).await.unwrap();
    assert_eq!(enriched, 1);
    assert_eq!(
        store.articles()[0].pub_date.unwrap().date_naive().to_string(),
        "2025-11-12"
    );
}
