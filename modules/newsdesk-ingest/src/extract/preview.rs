// Description/preview extraction: the short hook shown in the review UI.

use scraper::{Html, Selector};

/// Preview text is capped at this many characters.
pub const MAX_DESCRIPTION: usize = 300;

/// A candidate description below this length is noise, not a summary.
const MIN_DESCRIPTION: usize = 20;

/// (selector, attribute) pairs, first non-trivial hit wins. An empty
/// attribute means element text.
const DESCRIPTION_SELECTORS: &[(&str, &str)] = &[
    (r#"meta[name="description"]"#, "content"),
    (r#"meta[property="og:description"]"#, "content"),
    (r#"meta[name="twitter:description"]"#, "content"),
    (r#"meta[property="twitter:description"]"#, "content"),
    (".excerpt", ""),
    (".post-excerpt", ""),
    (".entry-summary", ""),
    (".article-summary", ""),
];

pub fn description_from_doc(doc: &Html) -> Option<String> {
    for (selector, attr) in DESCRIPTION_SELECTORS {
        let Ok(sel) = Selector::parse(selector) else { continue };
        for el in doc.select(&sel) {
            let value = if attr.is_empty() {
                el.text().collect::<String>()
            } else {
                el.value().attr(attr).unwrap_or_default().to_string()
            };
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            if value.chars().count() >= MIN_DESCRIPTION {
                return Some(truncate_preview(&value));
            }
        }
    }
    None
}

/// First substantial paragraph of already-cleaned content, as a fallback
/// preview.
pub fn first_paragraph(content: &str) -> Option<String> {
    content
        .split("\n\n")
        .map(str::trim)
        .find(|p| p.chars().count() >= MIN_DESCRIPTION)
        .map(truncate_preview)
}

/// Cap preview text at MAX_DESCRIPTION chars, breaking at a word boundary
/// and appending an ellipsis when truncated.
pub fn truncate_preview(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() <= MAX_DESCRIPTION {
        return s.to_string();
    }

    let cut: String = s.chars().take(MAX_DESCRIPTION - 1).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > MAX_DESCRIPTION / 2 => &cut[..idx],
        _ => &cut[..],
    };
    format!("{}…", cut.trim_end_matches([',', ';', ':', ' ']))
}
