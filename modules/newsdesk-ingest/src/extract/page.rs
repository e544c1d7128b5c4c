// Whole-page metadata extraction for scraped articles and the
// date-enrichment pass.

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde_json::Value;

use super::{clean, content, date, preview, title};

#[derive(Debug, Clone, Default)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub content: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub author: Option<String>,
}

/// Fields pulled out of a JSON-LD Article/BlogPosting/NewsArticle block.
#[derive(Debug, Default)]
struct JsonLdArticle {
    headline: Option<String>,
    name: Option<String>,
    date_published: Option<String>,
    description: Option<String>,
    author: Option<String>,
}

/// Extract canonical article fields from page HTML.
pub fn extract_metadata(html: &str, url: &str, now: DateTime<Utc>) -> PageMetadata {
    let doc = Html::parse_document(html);
    let json_ld = json_ld_article(&doc);

    let body = clean::clean_content(&content::container_text(&doc));

    let page_title = page_title(&doc, &json_ld, url);
    let pub_date = page_date(&doc, &json_ld, &body, now);
    let description = preview::description_from_doc(&doc)
        .or_else(|| {
            json_ld
                .as_ref()
                .and_then(|a| a.description.clone())
                .map(|d| preview::truncate_preview(&d))
        })
        .or_else(|| preview::first_paragraph(&body));

    PageMetadata {
        title: page_title,
        content: body,
        pub_date,
        description,
        author: json_ld.as_ref().and_then(|a| a.author.clone()),
    }
}

/// Title chain: Open Graph → JSON-LD headline/name → in-article <h1> →
/// cleaned <title> tag. Generic strings never win; a URL slug is the final
/// fallback.
fn page_title(doc: &Html, json_ld: &Option<JsonLdArticle>, url: &str) -> Option<String> {
    if let Some(og) = meta_content(doc, r#"meta[property="og:title"]"#) {
        let og = title::clean_title_tag(&og);
        if !title::is_generic_title(&og) {
            return Some(og);
        }
    }

    if let Some(article) = json_ld {
        for candidate in [&article.headline, &article.name] {
            if let Some(t) = candidate {
                let t = t.trim();
                if !t.is_empty() && !title::is_generic_title(t) {
                    return Some(t.to_string());
                }
            }
        }
    }

    if let Ok(sel) = Selector::parse("article h1, h1") {
        for el in doc.select(&sel) {
            let text = el.text().collect::<String>();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() && !title::is_generic_title(&text) {
                return Some(text);
            }
        }
    }

    if let Ok(sel) = Selector::parse("title") {
        if let Some(el) = doc.select(&sel).next() {
            let cleaned = title::clean_title_tag(&el.text().collect::<String>());
            if !cleaned.is_empty() && !title::is_generic_title(&cleaned) {
                return Some(cleaned);
            }
        }
    }

    title::title_from_slug(url)
}

/// Date chain: meta tags → JSON-LD → <time> elements → free-text month
/// names in the body. Everything passes the plausibility window or is
/// dropped.
fn page_date(
    doc: &Html,
    json_ld: &Option<JsonLdArticle>,
    body: &str,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    const DATE_META: &[&str] = &[
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="date"]"#,
        r#"meta[name="publish-date"]"#,
        r#"meta[name="publication_date"]"#,
        r#"meta[name="dc.date"]"#,
        r#"meta[itemprop="datePublished"]"#,
    ];

    for selector in DATE_META {
        if let Some(raw) = meta_content(doc, selector) {
            if let Some(parsed) = date::parse_raw_date(&raw).filter(|d| date::plausible(*d, now)) {
                return Some(parsed);
            }
        }
    }

    if let Some(raw) = json_ld.as_ref().and_then(|a| a.date_published.as_deref()) {
        if let Some(parsed) = date::parse_raw_date(raw).filter(|d| date::plausible(*d, now)) {
            return Some(parsed);
        }
    }

    if let Ok(sel) = Selector::parse("time") {
        for el in doc.select(&sel) {
            let raw = el
                .value()
                .attr("datetime")
                .map(|s| s.to_string())
                .unwrap_or_else(|| el.text().collect::<String>());
            if let Some(parsed) = date::parse_raw_date(raw.trim())
                .filter(|d| date::plausible(*d, now))
            {
                return Some(parsed);
            }
        }
    }

    // Last resort: a dateline in the opening of the body text.
    let head: String = body.chars().take(2000).collect();
    date::find_date_in_text(&head, now)
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Find the first JSON-LD block describing an article. Handles plain
/// objects, arrays, and @graph containers.
fn json_ld_article(doc: &Html) -> Option<JsonLdArticle> {
    let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for el in doc.select(&sel) {
        let raw = el.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        if let Some(article) = find_article_node(&value) {
            return Some(article);
        }
    }
    None
}

fn find_article_node(value: &Value) -> Option<JsonLdArticle> {
    match value {
        Value::Array(items) => items.iter().find_map(find_article_node),
        Value::Object(obj) => {
            if let Some(graph) = obj.get("@graph") {
                if let Some(found) = find_article_node(graph) {
                    return Some(found);
                }
            }
            if is_article_type(obj.get("@type")) {
                let text = |key: &str| {
                    obj.get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                };
                let author = obj.get("author").and_then(|a| match a {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => o
                        .get("name")
                        .and_then(|n| n.as_str())
                        .map(|s| s.to_string()),
                    Value::Array(arr) => arr.first().and_then(|first| {
                        first
                            .get("name")
                            .and_then(|n| n.as_str())
                            .map(|s| s.to_string())
                    }),
                    _ => None,
                });
                Some(JsonLdArticle {
                    headline: text("headline"),
                    name: text("name"),
                    date_published: text("datePublished"),
                    description: text("description"),
                    author,
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

fn is_article_type(type_value: Option<&Value>) -> bool {
    const ARTICLE_TYPES: &[&str] = &["Article", "BlogPosting", "NewsArticle"];
    match type_value {
        Some(Value::String(s)) => ARTICLE_TYPES.contains(&s.as_str()),
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str())
            .any(|s| ARTICLE_TYPES.contains(&s)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap()
    }

    const ARTICLE_PAGE: &str = r#"<html><head>
<title>Winter shelter expands | Example Times</title>
<meta property="og:title" content="Winter shelter expands capacity">
<meta name="description" content="The downtown shelter adds forty beds ahead of the cold season.">
<meta property="article:published_time" content="2025-11-12T08:00:00Z">
<script type="application/ld+json">
{"@context":"https://schema.org","@type":"NewsArticle",
 "headline":"Winter shelter expands capacity",
 "datePublished":"2025-11-12T08:00:00Z",
 "author":{"@type":"Person","name":"R. Alvarez"}}
</script>
</head><body>
<article>
<h1>Winter shelter expands capacity</h1>
<p>The downtown shelter will add forty beds ahead of the cold season, officials said.</p>
<p>Funding comes from a county grant approved earlier this year after lengthy debate.</p>
<p>Volunteers are being recruited for overnight shifts through the winter months.</p>
</article>
</body></html>"#;

    #[test]
    fn full_metadata_from_article_page() {
        let meta = extract_metadata(ARTICLE_PAGE, "https://example.com/shelter", fixed_now());
        assert_eq!(meta.title.as_deref(), Some("Winter shelter expands capacity"));
        assert_eq!(
            meta.pub_date.unwrap().date_naive().to_string(),
            "2025-11-12"
        );
        assert!(meta.content.contains("forty beds"));
        assert!(meta
            .description
            .as_deref()
            .unwrap()
            .starts_with("The downtown shelter adds"));
        assert_eq!(meta.author.as_deref(), Some("R. Alvarez"));
    }

    #[test]
    fn title_falls_back_to_h1_then_title_tag() {
        let html = r#"<html><head><title>Deep dive on zoning | Site</title></head>
<body><h1>Blog</h1><h1>Deep dive on zoning reform</h1><p>Body.</p></body></html>"#;
        let meta = extract_metadata(html, "https://example.com/zoning", fixed_now());
        assert_eq!(meta.title.as_deref(), Some("Deep dive on zoning reform"));
    }

    #[test]
    fn date_from_time_element_and_free_text() {
        let html = r#"<html><body><article>
<time datetime="2025-11-12">November 12</time>
<p>Enough body text to extract something meaningful from the page.</p>
</article></body></html>"#;
        let meta = extract_metadata(html, "https://example.com/x", fixed_now());
        assert_eq!(meta.pub_date.unwrap().date_naive().to_string(), "2025-11-12");

        let html = r#"<html><body><article>
<p>DENVER, November 12, 2025 — Officials confirmed the plan on Tuesday.</p>
</article></body></html>"#;
        let meta = extract_metadata(html, "https://example.com/y", fixed_now());
        assert_eq!(meta.pub_date.unwrap().date_naive().to_string(), "2025-11-12");
    }

    #[test]
    fn implausible_dates_leave_pub_date_unset() {
        let html = r#"<html><head>
<meta name="date" content="2055-01-01"></head>
<body><p>Body text without any other date signal present.</p></body></html>"#;
        let meta = extract_metadata(html, "https://example.com/z", fixed_now());
        assert!(meta.pub_date.is_none());
    }

    #[test]
    fn json_ld_graph_and_array_shapes() {
        let value: Value = serde_json::from_str(
            r#"{"@graph":[{"@type":"WebSite","name":"Site"},
                {"@type":["NewsArticle"],"headline":"Graph headline","datePublished":"2025-10-01"}]}"#,
        )
        .unwrap();
        let article = find_article_node(&value).unwrap();
        assert_eq!(article.headline.as_deref(), Some("Graph headline"));
        assert_eq!(article.date_published.as_deref(), Some("2025-10-01"));
    }
}
