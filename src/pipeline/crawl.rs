// src/pipeline/crawl.rs

//! One crawl cycle: fan out over all sources, then ingest the results.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{Article, Config};
use crate::sources::{self, JtbcSource, MbcSource, NewsSource, YtnSource};
use crate::storage::ArticleStore;
use crate::utils::create_client;

/// Counts from one crawl cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    /// Articles returned by all sources together
    pub collected: usize,

    /// Articles newly inserted into the store
    pub inserted: usize,

    /// Articles skipped because they were already stored
    pub duplicates: usize,

    /// Articles dropped for failing validation
    pub invalid: usize,

    /// Sources whose fetch failed outright
    pub failed_sources: usize,
}

/// Build the configured source set.
pub fn build_sources(config: &Config) -> Result<Vec<Arc<dyn NewsSource>>> {
    let client = create_client(&config.crawler)?;
    Ok(vec![
        Arc::new(YtnSource::new(client.clone(), &config.crawler)),
        Arc::new(JtbcSource::new(client.clone(), &config.crawler)),
        Arc::new(MbcSource::new(client)),
    ])
}

/// Insert crawled articles into the store, skipping duplicates.
///
/// Validation failures and duplicates are counted and skipped; storage
/// failures abort the ingest.
pub async fn store_articles(
    store: &Arc<dyn ArticleStore>,
    articles: &[Article],
    summary: &mut CrawlSummary,
) -> Result<()> {
    for article in articles {
        match store.insert(article).await {
            Ok(_) => summary.inserted += 1,
            Err(AppError::Duplicate(key)) => {
                debug!(%key, "article already stored");
                summary.duplicates += 1;
            }
            Err(AppError::InvalidInput(reason)) => {
                warn!(url = %article.url, %reason, "dropping invalid article");
                summary.invalid += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Run one full crawl cycle against the configured sources.
pub async fn run_crawl(config: &Config, store: &Arc<dyn ArticleStore>) -> Result<CrawlSummary> {
    let source_set = build_sources(config)?;
    info!(sources = source_set.len(), "starting crawl cycle");

    let reports = sources::crawl_all(&source_set, config.crawler.max_concurrent).await;

    let mut summary = CrawlSummary::default();
    for report in reports {
        match report.outcome {
            Ok(articles) => {
                summary.collected += articles.len();
                store_articles(store, &articles, &mut summary).await?;
            }
            Err(_) => summary.failed_sources += 1,
        }
    }

    info!(
        collected = summary.collected,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        invalid = summary.invalid,
        failed_sources = summary.failed_sources,
        "crawl cycle finished"
    );
    Ok(summary)
}
