// Link-keyed deduplication.
//
// The sanitized link is the article's whole identity: the cheap existence
// check runs before any expensive extraction, and a duplicate-key insert at
// persistence time counts as "already ingested" so concurrent runs racing on
// the same URL still converge to one record.

use std::sync::Arc;

use tracing::warn;

use crate::traits::ArticleStore;

/// Query/tracking parameters stripped before the link is used as a dedup
/// key, so the same article reached via newsletter and social links
/// collapses to one identity.
const TRACKING_PARAMS: &[&str] = &[
    "_dt", "fbclid", "gclid", "utm_source", "utm_medium", "utm_campaign",
    "utm_term", "utm_content", "modal", "ref", "mc_cid", "mc_eid",
];

/// Strip tracking parameters and fragments from an article link.
pub fn sanitize_link(link: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(link) else {
        return link.trim().to_string();
    };

    parsed.set_fragment(None);
    if parsed.query().is_none() {
        return parsed.to_string();
    }

    let clean_pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if clean_pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
    }

    parsed.to_string()
}

pub struct DedupGuard {
    store: Arc<dyn ArticleStore>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    /// Whether a link is new to the store. Store failures answer "yes" so a
    /// flaky backend degrades to the insert-time duplicate check instead of
    /// silently dropping articles.
    pub async fn should_ingest(&self, link: &str) -> bool {
        let key = sanitize_link(link);
        match self.store.article_exists(&key).await {
            Ok(exists) => !exists,
            Err(e) => {
                warn!(link = key.as_str(), error = %e, "Dedup lookup failed, proceeding");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_and_fragment() {
        assert_eq!(
            sanitize_link("https://example.com/a?utm_source=x&id=5&fbclid=abc#section"),
            "https://example.com/a?id=5"
        );
        assert_eq!(
            sanitize_link("https://example.com/a?utm_source=x"),
            "https://example.com/a"
        );
    }

    #[test]
    fn leaves_clean_links_alone() {
        assert_eq!(
            sanitize_link("https://example.com/posts/title"),
            "https://example.com/posts/title"
        );
    }

    #[test]
    fn unparsable_links_pass_through_trimmed() {
        assert_eq!(sanitize_link("  not a url  "), "not a url");
    }
}
