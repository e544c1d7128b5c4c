// Feed classification and parsing.
//
// The validator sniffs raw bytes instead of trusting transport content-types
// because many servers mislabel feed responses (text/html for RSS is common).
// The same sniff backs both discovery probing and explicit feed validation.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use newsdesk_common::RawItem;

/// Only the head of the response matters for classification.
const SNIFF_WINDOW: usize = 4096;

/// Most-recent window processed per feed per pass.
pub const FEED_ITEM_CAP: usize = 20;

/// Dated items older than this are dropped before processing.
const FEED_MAX_AGE_DAYS: i64 = 30;

const XML_FEED_MARKERS: &[&str] = &["<rss", "<feed", "<rdf:rdf", "<channel", "<?xml"];

/// Classify response bytes as feed content. Content-type independent.
pub fn is_feed_content(bytes: &[u8]) -> bool {
    let head = sniff_head(bytes);

    if head.contains("<html") || head.contains("<!doctype html") {
        return false;
    }
    if XML_FEED_MARKERS.iter().any(|m| head.contains(m)) {
        return true;
    }

    // JSON Feed: a top-level object carrying `version` and `items`/`item`.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
        if let Some(obj) = value.as_object() {
            return obj.contains_key("version")
                && (obj.contains_key("items") || obj.contains_key("item"));
        }
    }

    false
}

fn sniff_head(bytes: &[u8]) -> String {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    String::from_utf8_lossy(window).to_lowercase()
}

/// Parse feed bytes (RSS/Atom/JSON Feed) into raw items, in feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawItem>> {
    if bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
    {
        return parse_json_feed(bytes);
    }

    match feed_rs::parser::parse(bytes) {
        Ok(feed) => Ok(feed.entries.into_iter().map(item_from_entry).collect()),
        Err(e) => {
            // Cosmetic XML damage (stray `&`, truncated tail) is common in
            // hand-assembled feeds. If the bytes still look like a feed,
            // repair entities and try once more before giving up.
            let msg = e.to_string().to_lowercase();
            if is_cosmetic_xml_error(&msg) && has_xml_feed_markers(bytes) {
                let repaired = escape_stray_ampersands(&String::from_utf8_lossy(bytes));
                if let Ok(feed) = feed_rs::parser::parse(repaired.as_bytes()) {
                    warn!("Recovered malformed feed after entity repair");
                    return Ok(feed.entries.into_iter().map(item_from_entry).collect());
                }
            }
            Err(anyhow!(e)).context("Failed to parse feed")
        }
    }
}

fn has_xml_feed_markers(bytes: &[u8]) -> bool {
    let head = sniff_head(bytes);
    XML_FEED_MARKERS
        .iter()
        .filter(|m| **m != "<?xml")
        .any(|m| head.contains(m))
}

fn is_cosmetic_xml_error(msg: &str) -> bool {
    const COSMETIC: &[&str] = &[
        "unclosed token",
        "escape",
        "entity",
        "invalid character",
        "unexpected end",
    ];
    COSMETIC.iter().any(|p| msg.contains(p))
}

/// Escape `&` characters that do not begin a valid entity reference.
fn escape_stray_ampersands(s: &str) -> String {
    const NAMED: &[&str] = &["amp;", "lt;", "gt;", "quot;", "apos;"];

    let mut out = String::with_capacity(s.len() + 16);
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        let valid_named = NAMED.iter().any(|e| tail.starts_with(e));
        let valid_numeric = tail.strip_prefix('#').is_some_and(|t| {
            let t = t.strip_prefix('x').or_else(|| t.strip_prefix('X')).unwrap_or(t);
            let digits = t.chars().take_while(|c| c.is_ascii_alphanumeric()).count();
            digits > 0 && t[digits..].starts_with(';')
        });

        if valid_named || valid_numeric {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

fn item_from_entry(entry: feed_rs::model::Entry) -> RawItem {
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));

    let pub_date = entry
        .published
        .or(entry.updated)
        .map(|d| d.with_timezone(&Utc));

    RawItem {
        link,
        title: entry.title.map(|t| t.content),
        // RSS <description> and Atom <summary> both land here.
        description: entry.summary.map(|t| t.content),
        // RSS content:encoded and Atom <content> both land here.
        content: entry.content.and_then(|c| c.body),
        media_description: entry
            .media
            .iter()
            .find_map(|m| m.description.as_ref().map(|d| d.content.clone())),
        author: entry.authors.first().map(|p| p.name.clone()),
        pub_date,
        ..RawItem::default()
    }
}

fn parse_json_feed(bytes: &[u8]) -> Result<Vec<RawItem>> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).context("Failed to parse JSON feed")?;
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("JSON feed root is not an object"))?;
    if !obj.contains_key("version") {
        return Err(anyhow!("JSON feed missing version field"));
    }

    let items = obj
        .get("items")
        .or_else(|| obj.get("item"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("JSON feed missing items"))?;

    Ok(items.iter().map(item_from_json).collect())
}

fn item_from_json(value: &serde_json::Value) -> RawItem {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let author = value
        .get("author")
        .and_then(|a| a.get("name"))
        .or_else(|| {
            value
                .get("authors")
                .and_then(|v| v.as_array())
                .and_then(|a| a.first())
                .and_then(|a| a.get("name"))
        })
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let mut item = RawItem {
        link: text("url").or_else(|| text("external_url")),
        title: text("title"),
        content: text("content_html"),
        content_snippet: text("content_text"),
        summary: text("summary"),
        author,
        ..RawItem::default()
    };

    if let Some(raw) = text("date_published") {
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(dt) => item.pub_date = Some(dt.with_timezone(&Utc)),
            Err(_) => item.raw_date = Some(raw),
        }
    }

    item
}

/// Window a parsed feed down to the most recent `cap` items, dropping dated
/// items past the age cutoff. Undated items are kept in feed order.
pub fn most_recent(mut items: Vec<RawItem>, cap: usize, now: DateTime<Utc>) -> Vec<RawItem> {
    let cutoff = now - chrono::Duration::days(FEED_MAX_AGE_DAYS);
    items.retain(|i| i.pub_date.map(|d| d >= cutoff).unwrap_or(true));
    items.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    items.truncate(cap);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Sample</title>
<item><title>First</title><link>https://example.com/a</link>
<description>Short blurb</description>
<pubDate>Wed, 12 Nov 2025 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

    #[test]
    fn sniff_accepts_rss_and_atom() {
        assert!(is_feed_content(RSS_SAMPLE.as_bytes()));
        assert!(is_feed_content(b"<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>"));
        assert!(is_feed_content(b"<rdf:RDF></rdf:RDF>"));
    }

    #[test]
    fn sniff_rejects_html_even_with_xml_prologue() {
        assert!(!is_feed_content(b"<!DOCTYPE html><html><body>hi</body></html>"));
        assert!(!is_feed_content(
            b"<?xml version=\"1.0\"?><html><body>disguised</body></html>"
        ));
        assert!(!is_feed_content(b"plain text, nothing else"));
    }

    #[test]
    fn sniff_accepts_json_feed_shape_only() {
        assert!(is_feed_content(
            br#"{"version":"https://jsonfeed.org/version/1.1","items":[]}"#
        ));
        assert!(!is_feed_content(br#"{"items":[]}"#));
        assert!(!is_feed_content(br#"{"version":"1"}"#));
        assert!(!is_feed_content(br#"[1,2,3]"#));
    }

    #[test]
    fn parses_rss_items_in_feed_order() {
        let items = parse_feed(RSS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("First"));
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/a"));
        assert_eq!(items[0].description.as_deref(), Some("Short blurb"));
        assert!(items[0].pub_date.is_some());
    }

    #[test]
    fn parses_json_feed_items() {
        let body = br#"{"version":"https://jsonfeed.org/version/1.1","items":[
            {"url":"https://example.com/p1","title":"Post one",
             "content_text":"Body text","date_published":"2025-11-12T08:00:00Z"},
            {"url":"https://example.com/p2","title":"Post two",
             "content_html":"<p>Rich</p>","date_published":"not a date"}
        ]}"#;
        let items = parse_feed(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content_snippet.as_deref(), Some("Body text"));
        assert!(items[0].pub_date.is_some());
        assert!(items[1].pub_date.is_none());
        assert_eq!(items[1].raw_date.as_deref(), Some("not a date"));
    }

    #[test]
    fn recovers_feed_with_unescaped_ampersand() {
        let broken = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>News & Views</title>
<item><title>Fish & Chips</title><link>https://example.com/fc</link></item>
</channel></rss>"#;
        let items = parse_feed(broken.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Fish & Chips"));
    }

    #[test]
    fn ampersand_escape_leaves_valid_entities_alone() {
        assert_eq!(
            escape_stray_ampersands("a &amp; b & c &#8217;"),
            "a &amp; b &amp; c &#8217;"
        );
    }

    #[test]
    fn most_recent_caps_and_drops_stale() {
        let now = Utc::now();
        let mut items = Vec::new();
        for age_days in [1i64, 5, 60, 2] {
            items.push(RawItem {
                link: Some(format!("https://example.com/{age_days}")),
                pub_date: Some(now - chrono::Duration::days(age_days)),
                ..RawItem::default()
            });
        }
        // Undated item survives windowing.
        items.push(RawItem::with_link("https://example.com/undated"));

        let windowed = most_recent(items, 3, now);
        assert_eq!(windowed.len(), 3);
        // 60-day-old item dropped, newest first.
        assert_eq!(windowed[0].link.as_deref(), Some("https://example.com/1"));
        assert_eq!(windowed[1].link.as_deref(), Some("https://example.com/2"));
        assert_eq!(windowed[2].link.as_deref(), Some("https://example.com/5"));
    }
}
