// Title heuristics for feed items and scraped pages.
//
// Feeds swap fields, stuff whole paragraphs into <title>, or ship bare URLs
// where a headline belongs. These repairs keep the invariant that an
// article's title is non-empty and never a naked URL.

use url::Url;

/// Titles longer than this with near-empty content indicate swapped fields.
const SWAP_TITLE_LEN: usize = 200;
const SWAP_CONTENT_LEN: usize = 100;

/// Titles longer than this get reduced to their leading clause.
const LONG_TITLE_LEN: usize = 150;

/// Known-generic titles that carry no information about the article.
const GENERIC_TITLES: &[&str] = &[
    "blog",
    "all posts",
    "latest by topic",
    "news",
    "home",
    "homepage",
    "articles",
    "posts",
    "untitled",
    "welcome",
];

/// Titles that mark an error page rather than an article.
const ERROR_TITLE_MARKERS: &[&str] = &[
    "404",
    "page not found",
    "just a moment",
    "access denied",
    "attention required",
    "are you a robot",
];

pub fn is_bare_url(s: &str) -> bool {
    let s = s.trim();
    (s.starts_with("http://") || s.starts_with("https://") || s.starts_with("www."))
        && !s.contains(char::is_whitespace)
}

pub fn is_generic_title(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower.len() < 3 || GENERIC_TITLES.contains(&lower.as_str())
}

/// Whether a title signals an error page ("404", interstitials, bot walls).
/// Articles with these titles are skipped, never stored.
pub fn is_error_page_title(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower == "error"
        || ERROR_TITLE_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
}

/// First sentence-like clause of 10–100 chars, for carving a headline out
/// of overlong text.
pub fn leading_clause(s: &str) -> Option<String> {
    let first_line = s.trim().lines().next()?.trim();

    let mut end = first_line.len();
    for (idx, c) in first_line.char_indices() {
        if matches!(c, '.' | '!' | '?' | ';') {
            end = idx;
            break;
        }
    }
    let clause = first_line[..end].trim().trim_end_matches([',', ':']);

    let len = clause.chars().count();
    (10..=100).contains(&len).then(|| clause.to_string())
}

/// Derive a human-readable title from the link's path slug.
pub fn title_from_slug(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?
        .to_string();

    let stem = segment.split('.').next().unwrap_or(&segment);
    if stem.chars().all(|c| c.is_ascii_digit()) || stem.len() < 4 {
        return None;
    }

    let words: Vec<String> = stem
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    (!words.is_empty()).then(|| words.join(" "))
}

/// Strip `"Headline | Site Name"`-style suffixes from a `<title>` tag by
/// keeping the longest delimited segment.
pub fn clean_title_tag(title: &str) -> String {
    let title = title.trim();
    for delimiter in [" | ", " – ", " — ", " - ", " :: "] {
        if title.contains(delimiter) {
            if let Some(best) = title
                .split(delimiter)
                .map(str::trim)
                .max_by_key(|seg| seg.chars().count())
            {
                return best.to_string();
            }
        }
    }
    title.to_string()
}

/// Reconcile a feed item's title and content, repairing swaps and bare-URL
/// titles. Returns the final (title, content) pair.
pub fn resolve(
    title: Option<String>,
    content: String,
    link: Option<&str>,
) -> (String, String) {
    let mut title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let mut content = content;

    // Whole-article text in the title next to a stub content field: the
    // producer swapped them.
    if let Some(t) = &title {
        if t.chars().count() > SWAP_TITLE_LEN && content.chars().count() < SWAP_CONTENT_LEN {
            let swapped_out = std::mem::replace(&mut content, t.clone());
            title = Some(swapped_out).filter(|s| !s.trim().is_empty());
        }
    }

    // Still too long for a headline: keep the leading clause.
    if let Some(t) = &title {
        if t.chars().count() > LONG_TITLE_LEN {
            if let Some(clause) = leading_clause(t) {
                title = Some(clause);
            }
        }
    }

    // A URL is not a headline.
    if title.as_deref().is_some_and(is_bare_url) {
        title = if !content.trim().is_empty() && !is_bare_url(content.trim()) {
            leading_clause(&content).or_else(|| link.and_then(title_from_slug))
        } else {
            link.and_then(title_from_slug)
        };
    }

    let title = match title {
        Some(t) if !is_generic_title(&t) => t,
        _ => link
            .and_then(title_from_slug)
            .or_else(|| leading_clause(&content))
            .unwrap_or_else(|| "Untitled".to_string()),
    };

    (title, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bare_urls() {
        assert!(is_bare_url("https://example.com/a-post"));
        assert!(is_bare_url("www.example.com/a-post"));
        assert!(!is_bare_url("Read https://example.com today"));
        assert!(!is_bare_url("A normal headline"));
    }

    #[test]
    fn swapped_title_and_content_are_exchanged() {
        let long = "word ".repeat(50);
        let (title, content) = resolve(
            Some(long.clone()),
            "Council votes on housing plan".to_string(),
            None,
        );
        assert_eq!(title, "Council votes on housing plan");
        assert_eq!(content, long);
    }

    #[test]
    fn overlong_title_reduced_to_leading_clause() {
        let t = "City approves new bike lanes downtown. The vote followed two hours of \
public comment from residents on both sides, and further sessions are scheduled for spring."
            .to_string();
        let (title, _) = resolve(Some(t), "Body text that is long enough to keep.".to_string(), None);
        assert_eq!(title, "City approves new bike lanes downtown");
    }

    #[test]
    fn bare_url_title_replaced_from_content_or_slug() {
        let (title, _) = resolve(
            Some("https://example.com/p/123".to_string()),
            "Shelter expands winter hours after record demand. More below.".to_string(),
            Some("https://example.com/p/123"),
        );
        assert_eq!(title, "Shelter expands winter hours after record demand");

        let (title, _) = resolve(
            Some("https://example.com/big-grant-announced".to_string()),
            String::new(),
            Some("https://example.com/big-grant-announced"),
        );
        assert_eq!(title, "Big Grant Announced");
    }

    #[test]
    fn generic_title_falls_back_to_slug() {
        let (title, _) = resolve(
            Some("Blog".to_string()),
            "Some body".to_string(),
            Some("https://example.com/posts/shelter-funding-update"),
        );
        assert_eq!(title, "Shelter Funding Update");
    }

    #[test]
    fn title_tag_suffixes_are_stripped() {
        assert_eq!(
            clean_title_tag("Shelter expands winter hours | Example Times"),
            "Shelter expands winter hours"
        );
        assert_eq!(
            clean_title_tag("Example Times - Shelter expands winter hours"),
            "Shelter expands winter hours"
        );
        assert_eq!(clean_title_tag("Plain headline"), "Plain headline");
    }

    #[test]
    fn error_page_titles_flagged() {
        assert!(is_error_page_title("404 Not Found"));
        assert!(is_error_page_title("Just a moment..."));
        assert!(is_error_page_title("Page Not Found — Example"));
        assert!(!is_error_page_title("Error rates drop after migration"));
    }
}
