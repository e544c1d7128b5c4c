// Date enrichment: revisit recently ingested date-less articles and try the
// page-level date heuristics again. Per-article failures are logged and
// skipped; the pass always completes.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use newsdesk_common::ArticlePatch;

use crate::extract::ExtractionPipeline;
use crate::traits::ArticleStore;

pub async fn enrich_missing_dates(
    store: &dyn ArticleStore,
    pipeline: &ExtractionPipeline,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<usize> {
    let articles = store.articles_missing_date(limit).await?;
    info!(candidates = articles.len(), "Starting date enrichment");

    let mut enriched = 0usize;
    for article in articles {
        let meta = match pipeline.page_metadata(&article.link, now).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(link = article.link.as_str(), error = %e, "Enrichment fetch failed");
                continue;
            }
        };

        let Some(date) = meta.pub_date else {
            debug!(link = article.link.as_str(), "Still no plausible date");
            continue;
        };

        let patch = ArticlePatch {
            pub_date: Some(date),
            ..ArticlePatch::default()
        };
        match store.update_article(article.id, patch).await {
            Ok(()) => enriched += 1,
            Err(e) => warn!(link = article.link.as_str(), error = %e, "Date update failed"),
        }
    }

    info!(enriched, "Date enrichment complete");
    Ok(enriched)
}
