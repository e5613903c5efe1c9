// src/pipeline/enqueue.rs

//! Selection of stored articles into the publish queue.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{Article, FilterConfig, QueueItem};
use crate::queue::QueueEngine;
use crate::storage::{ArticleQuery, ArticleStore, PublishedStore};

/// Moves eligible articles from the article store into the queue.
pub struct EnqueueService {
    articles: Arc<dyn ArticleStore>,
    queue: QueueEngine,
    published: Arc<dyn PublishedStore>,
}

impl EnqueueService {
    pub fn new(
        articles: Arc<dyn ArticleStore>,
        queue: QueueEngine,
        published: Arc<dyn PublishedStore>,
    ) -> Self {
        Self {
            articles,
            queue,
            published,
        }
    }

    /// Queue stored articles that match the filter and were not yet
    /// published or queued. Returns the number of items inserted.
    ///
    /// Articles already in the published set are skipped first, then
    /// anything the queue already knows in any status; an insert lost to a
    /// concurrent enqueue also counts as skipped, not as a failure.
    pub async fn add_articles_from_db(&self, filter: &FilterConfig) -> Result<usize> {
        let candidates = self.select_candidates(filter).await?;
        let total = candidates.len();

        let mut added = 0;
        for article in candidates {
            if self.published.contains(&article.unique_id).await? {
                debug!(unique_id = %article.unique_id, "already published");
                continue;
            }
            if self.queue.is_duplicate(&article.unique_id).await? {
                debug!(unique_id = %article.unique_id, "already queued");
                continue;
            }

            if self.queue.enqueue(QueueItem::from_article(&article)).await? {
                added += 1;
            }
        }

        info!(considered = total, added, "enqueue pass finished");
        Ok(added)
    }

    /// Query the article store per the filter, newest first.
    async fn select_candidates(&self, filter: &FilterConfig) -> Result<Vec<Article>> {
        let since = filter.hours.map(|hours| {
            TimeDelta::try_hours(hours)
                .and_then(|delta| Utc::now().checked_sub_signed(delta))
                .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
        });

        let base_query = |platform: Option<&str>| {
            let mut query = ArticleQuery::default();
            if let Some(platform) = platform {
                query = query.platform(platform);
            }
            if let Some(since) = since {
                query = query.since(since);
            }
            query
        };

        let mut candidates = if filter.platforms.is_empty() {
            self.articles.find(&base_query(None)).await?
        } else {
            let mut merged = Vec::new();
            for platform in &filter.platforms {
                merged.extend(self.articles.find(&base_query(Some(platform))).await?);
            }
            merged.sort_by(|a, b| b.metadata.collected_at.cmp(&a.metadata.collected_at));
            merged
        };

        if !filter.categories.is_empty() {
            candidates.retain(|article| {
                article
                    .metadata
                    .category
                    .as_deref()
                    .is_some_and(|category| filter.categories.iter().any(|f| f == category))
            });
        }

        if let Some(limit) = filter.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{ArticleMetadata, PublishedRecord};
    use crate::storage::{
        MemoryArticleStore, MemoryPublishedStore, MemoryQueueStore, QueueStore,
    };

    struct Fixture {
        service: EnqueueService,
        articles: Arc<dyn ArticleStore>,
        queue: QueueEngine,
        published: Arc<MemoryPublishedStore>,
    }

    fn fixture() -> Fixture {
        let articles: Arc<dyn ArticleStore> = Arc::new(MemoryArticleStore::new());
        let queue = QueueEngine::new(Arc::new(MemoryQueueStore::new()) as Arc<dyn QueueStore>);
        let published = Arc::new(MemoryPublishedStore::new());

        let service = EnqueueService::new(
            Arc::clone(&articles),
            queue.clone(),
            Arc::clone(&published) as Arc<dyn PublishedStore>,
        );
        Fixture {
            service,
            articles,
            queue,
            published,
        }
    }

    fn sample_article(platform: &str, article_id: &str, hours_ago: i64) -> Article {
        let mut meta = ArticleMetadata::new(platform);
        meta.article_id = Some(article_id.to_string());
        meta.category = Some("politics".to_string());
        meta.collected_at = Utc::now() - Duration::hours(hours_ago);
        Article::new(
            format!("Headline {article_id}"),
            format!("https://news.example.com/{platform}/{article_id}"),
            meta,
        )
    }

    #[tokio::test]
    async fn test_add_articles_skips_published_and_queued() {
        let f = fixture();
        f.articles.insert(&sample_article("YTN", "1", 1)).await.unwrap();
        f.articles.insert(&sample_article("YTN", "2", 2)).await.unwrap();
        f.articles.insert(&sample_article("YTN", "3", 3)).await.unwrap();

        // One already delivered, one already sitting in the queue
        f.published
            .add(&PublishedRecord::new("YTN_1", "webhook"))
            .await
            .unwrap();
        let pre_queued = QueueItem::from_article(&sample_article("YTN", "2", 2));
        f.queue.enqueue(pre_queued).await.unwrap();

        let added = f
            .service
            .add_articles_from_db(&FilterConfig::default())
            .await
            .unwrap();
        assert_eq!(added, 1);

        assert!(f.queue.is_duplicate("YTN_3").await.unwrap());
        assert!(!f.queue.is_duplicate("YTN_1").await.unwrap());

        // A second pass adds nothing
        let added = f
            .service
            .add_articles_from_db(&FilterConfig::default())
            .await
            .unwrap();
        assert_eq!(added, 0);
    }

    #[tokio::test]
    async fn test_filters_bound_the_selection() {
        let f = fixture();
        f.articles.insert(&sample_article("YTN", "1", 1)).await.unwrap();
        f.articles.insert(&sample_article("MBC", "2", 2)).await.unwrap();
        f.articles.insert(&sample_article("YTN", "3", 48)).await.unwrap();

        let filter = FilterConfig {
            platforms: vec!["YTN".to_string()],
            hours: Some(24),
            ..FilterConfig::default()
        };
        let added = f.service.add_articles_from_db(&filter).await.unwrap();
        assert_eq!(added, 1);
        assert!(f.queue.is_duplicate("YTN_1").await.unwrap());
        assert!(!f.queue.is_duplicate("MBC_2").await.unwrap());
        assert!(!f.queue.is_duplicate("YTN_3").await.unwrap());
    }

    #[tokio::test]
    async fn test_limit_takes_newest_first() {
        let f = fixture();
        f.articles.insert(&sample_article("YTN", "old", 10)).await.unwrap();
        f.articles.insert(&sample_article("YTN", "new", 1)).await.unwrap();

        let filter = FilterConfig {
            limit: Some(1),
            ..FilterConfig::default()
        };
        let added = f.service.add_articles_from_db(&filter).await.unwrap();
        assert_eq!(added, 1);
        assert!(f.queue.is_duplicate("YTN_new").await.unwrap());
    }

    #[tokio::test]
    async fn test_category_filter() {
        let f = fixture();
        let mut economy = sample_article("JTBC", "1", 1);
        economy.metadata.category = Some("economy".to_string());
        f.articles.insert(&economy).await.unwrap();
        f.articles.insert(&sample_article("JTBC", "2", 1)).await.unwrap();

        let filter = FilterConfig {
            categories: vec!["economy".to_string()],
            ..FilterConfig::default()
        };
        let added = f.service.add_articles_from_db(&filter).await.unwrap();
        assert_eq!(added, 1);
        assert!(f.queue.is_duplicate("JTBC_1").await.unwrap());
    }
}
