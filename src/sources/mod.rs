// src/sources/mod.rs

//! News-source adapters and the concurrent crawl fan-out.
//!
//! Each adapter polls one upstream platform and returns the finite batch
//! of articles it currently lists. The fan-out runs every adapter
//! concurrently and isolates failures: one broken source never cancels or
//! starves its siblings, it just shows up in the report with its error.
//! Cancelling the fan-out future itself cancels all adapters.

pub mod jtbc;
pub mod mbc;
pub mod ytn;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use crate::error::Result;
use crate::models::Article;

pub use jtbc::JtbcSource;
pub use mbc::MbcSource;
pub use ytn::YtnSource;

/// One upstream news platform.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Short platform tag (e.g. "YTN").
    fn tag(&self) -> &str;

    /// Poll the platform once and return its current articles.
    async fn fetch(&self) -> Result<Vec<Article>>;
}

/// Outcome of one source in a crawl cycle.
pub struct SourceReport {
    pub source: String,
    pub outcome: Result<Vec<Article>>,
}

impl SourceReport {
    pub fn article_count(&self) -> usize {
        self.outcome.as_ref().map_or(0, Vec::len)
    }
}

/// Run all sources concurrently and wait for every one to finish.
///
/// Each adapter's error is captured into its report; sibling adapters keep
/// running and their results are returned regardless. At most
/// `max_concurrent` sources are polled at once; reports come back in
/// completion order.
pub async fn crawl_all(
    sources: &[Arc<dyn NewsSource>],
    max_concurrent: usize,
) -> Vec<SourceReport> {
    let fetches = sources.iter().map(|source| {
        let source = Arc::clone(source);
        async move {
            let tag = source.tag().to_string();
            match source.fetch().await {
                Ok(articles) => {
                    info!(source = %tag, count = articles.len(), "source crawl finished");
                    SourceReport {
                        source: tag,
                        outcome: Ok(articles),
                    }
                }
                Err(err) => {
                    error!(source = %tag, error = %err, "source crawl failed");
                    SourceReport {
                        source: tag,
                        outcome: Err(err),
                    }
                }
            }
        }
    });

    stream::iter(fetches)
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::AppError;
    use crate::models::ArticleMetadata;

    struct FixedSource {
        tag: &'static str,
        delay: Duration,
        count: usize,
    }

    #[async_trait]
    impl NewsSource for FixedSource {
        fn tag(&self) -> &str {
            self.tag
        }

        async fn fetch(&self) -> Result<Vec<Article>> {
            tokio::time::sleep(self.delay).await;
            Ok((0..self.count)
                .map(|i| {
                    let mut meta = ArticleMetadata::new(self.tag);
                    meta.article_id = Some(format!("{i}"));
                    Article::new(
                        format!("{} headline {i}", self.tag),
                        format!("https://example.com/{}/{i}", self.tag),
                        meta,
                    )
                })
                .collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl NewsSource for BrokenSource {
        fn tag(&self) -> &str {
            "BROKEN"
        }

        async fn fetch(&self) -> Result<Vec<Article>> {
            Err(AppError::transient("list endpoint", "503 service unavailable"))
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let sources: Vec<Arc<dyn NewsSource>> = vec![
            Arc::new(FixedSource {
                tag: "A",
                delay: Duration::from_millis(20),
                count: 2,
            }),
            Arc::new(BrokenSource),
            Arc::new(FixedSource {
                tag: "B",
                delay: Duration::from_millis(5),
                count: 3,
            }),
        ];

        let reports = crawl_all(&sources, 4).await;
        assert_eq!(reports.len(), 3);

        let a = reports.iter().find(|r| r.source == "A").unwrap();
        assert_eq!(a.article_count(), 2);

        let broken = reports.iter().find(|r| r.source == "BROKEN").unwrap();
        assert!(broken.outcome.is_err());
        assert_eq!(broken.article_count(), 0);

        let b = reports.iter().find(|r| r.source == "B").unwrap();
        assert_eq!(b.article_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_source_list_is_fine() {
        let reports = crawl_all(&[], 4).await;
        assert!(reports.is_empty());
    }
}
