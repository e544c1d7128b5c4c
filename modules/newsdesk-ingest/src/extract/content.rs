// Body-content selection: feed fields first, full page as fallback.

use scraper::{Html, Selector};

use newsdesk_common::RawItem;

/// Feed fields shorter than this are considered empty for content purposes.
pub const MIN_INLINE_CONTENT: usize = 50;

/// Cleaned content below this length triggers a full-page fetch when the
/// item carries a link.
pub const FULL_FETCH_THRESHOLD: usize = 240;

/// A container must yield at least this much text to win outright.
const MIN_CONTAINER_TEXT: usize = 200;

/// Likely article containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".post-body",
    ".story-body",
    ".story-content",
    "main article",
    "#content",
    ".content",
    "main",
];

/// Pick item content by field preference. Returns None when nothing beats
/// the minimum, letting the caller fall back to the link placeholder.
pub fn content_from_item(item: &RawItem) -> Option<String> {
    let candidates = [
        &item.content_snippet,
        &item.description,
        &item.content,
        &item.summary,
        &item.content_encoded,
        &item.media_description,
    ];

    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| s.chars().count() > MIN_INLINE_CONTENT)
        .map(|s| s.to_string())
}

/// Extract main-article text from page HTML: the first container selector
/// yielding enough text wins; otherwise every `<p>` on the page.
pub fn container_text(doc: &Html) -> String {
    let text_sel =
        Selector::parse("p, li, h2, h3, blockquote").expect("valid text selector");

    let mut best = String::new();
    for selector in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else { continue };

        // Pick the largest matching container (pages often nest several
        // <article> elements for teasers).
        let container = doc
            .select(&sel)
            .max_by_key(|el| el.text().map(str::len).sum::<usize>());
        let Some(container) = container else { continue };

        let text = join_block_text(container.select(&text_sel));
        if text.chars().count() >= MIN_CONTAINER_TEXT {
            return text;
        }
        if text.len() > best.len() {
            best = text;
        }
    }

    let p_sel = Selector::parse("p").expect("valid p selector");
    let all_paragraphs = join_block_text(doc.select(&p_sel));
    if all_paragraphs.len() > best.len() {
        all_paragraphs
    } else {
        best
    }
}

pub fn extract_page_text(html: &str) -> String {
    container_text(&Html::parse_document(html))
}

fn join_block_text<'a>(elements: impl Iterator<Item = scraper::ElementRef<'a>>) -> String {
    let blocks: Vec<String> = elements
        .map(|el| {
            el.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect();
    blocks.join("\n\n")
}
