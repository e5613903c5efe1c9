// src/publish/worker.rs

//! The publisher worker loop.
//!
//! Each iteration claims one batch, dispatches it with bounded concurrency
//! and reports every item's outcome back to the queue engine. A claimed
//! batch is always driven to a terminal report before shutdown is honored,
//! so a clean stop never strands items in PROCESSING; claims lost to a
//! crash are recovered by the periodic stuck-claim sweep.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{AppError, Result};
use crate::models::{PublishedRecord, PublisherConfig, QueueConfig, QueueItem};
use crate::publish::{format, ChatTarget, DELIVERY_CHANNEL};
use crate::queue::QueueEngine;
use crate::storage::PublishedStore;

/// One maintenance sweep: retry gate, stuck-claim sweep, queue clean and
/// published-set prune.
///
/// The worker runs this periodically; one-shot commands run it once per
/// cycle so failed items and abandoned claims recover even when no
/// long-lived worker is around.
pub async fn run_maintenance(
    queue: &QueueEngine,
    published: &dyn PublishedStore,
    config: &QueueConfig,
) -> Result<()> {
    queue.retry(config.max_retries).await?;
    queue.release_stuck(config.stuck_threshold()).await?;
    queue.clean(config.clean_age()).await?;

    let retention = TimeDelta::from_std(config.published_retention()).unwrap_or(TimeDelta::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    published.prune(cutoff).await?;
    Ok(())
}

pub struct PublisherWorker {
    queue: QueueEngine,
    published: Arc<dyn PublishedStore>,
    target: Arc<dyn ChatTarget>,
    queue_config: QueueConfig,
    publisher_config: PublisherConfig,
}

impl PublisherWorker {
    pub fn new(
        queue: QueueEngine,
        published: Arc<dyn PublishedStore>,
        target: Arc<dyn ChatTarget>,
        queue_config: QueueConfig,
        publisher_config: PublisherConfig,
    ) -> Self {
        Self {
            queue,
            published,
            target,
            queue_config,
            publisher_config,
        }
    }

    /// Run until the shutdown flag flips.
    ///
    /// Storage errors abort the loop; delivery failures do not.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            batch_size = self.publisher_config.batch_size,
            interval_secs = self.publisher_config.publish_interval_secs,
            "publisher worker started"
        );

        self.run_maintenance().await?;

        let mut iterations: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let processed = self.process_batch().await?;
            iterations += 1;

            let every = self.publisher_config.maintenance_every.max(1);
            if iterations % every == 0 {
                self.run_maintenance().await?;
            }

            if processed == 0 {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(self.publisher_config.publish_interval()) => {}
                }
            }
        }

        info!("publisher worker stopped");
        Ok(())
    }

    /// Claim and dispatch one batch. Returns the number of items claimed.
    pub async fn process_batch(&self) -> Result<usize> {
        let items = self.queue.claim(self.publisher_config.batch_size).await?;
        if items.is_empty() {
            debug!("no pending items");
            return Ok(0);
        }

        let count = items.len();
        info!(count, "dispatching batch");

        let results: Vec<Result<()>> = stream::iter(items)
            .map(|item| self.publish_item(item))
            .buffer_unordered(self.publisher_config.max_concurrent_sends.max(1))
            .collect()
            .await;

        // The whole batch reaches a terminal report before any storage
        // error from within it aborts the worker.
        for result in results {
            result?;
        }
        Ok(count)
    }

    /// Deliver one claimed item and report its outcome.
    ///
    /// Delivery failures are swallowed into `fail`/`fail_permanently`
    /// reports; only storage failures surface to the caller.
    async fn publish_item(&self, item: QueueItem) -> Result<()> {
        let message = format::render(&item);

        match self.target.send(&message).await {
            Ok(()) => {
                self.queue.complete(&item.unique_id).await?;
                self.published
                    .add(&PublishedRecord::new(&item.unique_id, DELIVERY_CHANNEL))
                    .await?;
                info!(unique_id = %item.unique_id, title = %item.title, "article published");
                Ok(())
            }
            Err(err @ AppError::Permanent { .. }) => {
                error!(unique_id = %item.unique_id, error = %err, "delivery rejected");
                self.queue
                    .fail_permanently(
                        &item.unique_id,
                        &err.to_string(),
                        self.queue_config.max_retries,
                    )
                    .await?;
                Ok(())
            }
            Err(err) => {
                error!(unique_id = %item.unique_id, error = %err, "delivery failed");
                self.queue.fail(&item.unique_id, &err.to_string()).await?;
                Ok(())
            }
        }
    }

    /// Retry gate, stuck-claim sweep, queue clean and published-set prune.
    pub async fn run_maintenance(&self) -> Result<()> {
        run_maintenance(&self.queue, self.published.as_ref(), &self.queue_config).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::models::{Article, ArticleMetadata, QueueStatus};
    use crate::publish::NewsMessage;
    use crate::storage::{MemoryPublishedStore, MemoryQueueStore, PublishedStore, QueueStore};

    #[derive(Clone, Copy)]
    enum Mode {
        Deliver,
        FailTransient,
        FailPermanent,
    }

    struct MockTarget {
        mode: Mode,
        sent: Mutex<Vec<NewsMessage>>,
    }

    impl MockTarget {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatTarget for MockTarget {
        async fn send(&self, message: &NewsMessage) -> crate::error::Result<()> {
            match self.mode {
                Mode::Deliver => {
                    self.sent.lock().await.push(message.clone());
                    Ok(())
                }
                Mode::FailTransient => Err(AppError::transient("mock", "connection reset")),
                Mode::FailPermanent => Err(AppError::permanent("mock", "unknown webhook")),
            }
        }
    }

    struct Fixture {
        worker: PublisherWorker,
        queue: QueueEngine,
        queue_store: Arc<MemoryQueueStore>,
        published: Arc<MemoryPublishedStore>,
        target: Arc<MockTarget>,
    }

    fn fixture(mode: Mode) -> Fixture {
        let queue_store = Arc::new(MemoryQueueStore::new());
        let queue = QueueEngine::new(Arc::clone(&queue_store) as Arc<dyn QueueStore>);
        let published = Arc::new(MemoryPublishedStore::new());
        let target = MockTarget::new(mode);

        let worker = PublisherWorker::new(
            queue.clone(),
            Arc::clone(&published) as Arc<dyn PublishedStore>,
            Arc::clone(&target) as Arc<dyn ChatTarget>,
            QueueConfig::default(),
            PublisherConfig::default(),
        );

        Fixture {
            worker,
            queue,
            queue_store,
            published,
            target,
        }
    }

    async fn enqueue_sample(queue: &QueueEngine, unique_id: &str) {
        let mut meta = ArticleMetadata::new("YTN");
        meta.article_id = Some(unique_id.trim_start_matches("YTN_").to_string());
        meta.category = Some("politics".to_string());
        let article = Article::new(
            format!("Headline {unique_id}"),
            format!("https://news.example.com/{unique_id}"),
            meta,
        )
        .with_content("Body text for the embed");
        let item = crate::models::QueueItem::from_article(&article);
        assert!(queue.enqueue(item).await.unwrap());
    }

    #[tokio::test]
    async fn test_successful_batch_completes_and_records() {
        let f = fixture(Mode::Deliver);
        enqueue_sample(&f.queue, "YTN_1").await;
        enqueue_sample(&f.queue, "YTN_2").await;

        let processed = f.worker.process_batch().await.unwrap();
        assert_eq!(processed, 2);

        let counts = f.queue.status().await.unwrap();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.processing, 0);

        assert!(f.published.contains("YTN_1").await.unwrap());
        assert!(f.published.contains("YTN_2").await.unwrap());
        assert_eq!(f.target.sent.lock().await.len(), 2);

        // Nothing left to claim
        assert_eq!(f.worker.process_batch().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_enters_retry_cycle() {
        let f = fixture(Mode::FailTransient);
        enqueue_sample(&f.queue, "YTN_1").await;

        f.worker.process_batch().await.unwrap();

        let item = f.queue_store.get("YTN_1").await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 1);
        assert!(item.error_message.unwrap().contains("connection reset"));
        assert!(!f.published.contains("YTN_1").await.unwrap());

        // Retry gate re-queues it
        assert_eq!(f.queue.retry(3).await.unwrap(), 1);
        let item = f.queue_store.get("YTN_1").await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_permanent_failure_exhausts_retries() {
        let f = fixture(Mode::FailPermanent);
        enqueue_sample(&f.queue, "YTN_1").await;

        f.worker.process_batch().await.unwrap();

        let item = f.queue_store.get("YTN_1").await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, QueueConfig::default().max_retries);

        assert_eq!(f.queue.retry(QueueConfig::default().max_retries).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_maintenance_requeues_failed_items() {
        let f = fixture(Mode::FailTransient);
        enqueue_sample(&f.queue, "YTN_1").await;
        f.worker.process_batch().await.unwrap();

        f.worker.run_maintenance().await.unwrap();

        let counts = f.queue.status().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 0);
    }

    #[tokio::test]
    async fn test_pipeline_publishes_each_article_once() {
        use crate::pipeline::EnqueueService;
        use crate::storage::{ArticleStore, MemoryArticleStore};

        let f = fixture(Mode::Deliver);
        let articles: Arc<dyn ArticleStore> = Arc::new(MemoryArticleStore::new());

        let mut meta = ArticleMetadata::new("YTN");
        meta.article_id = Some("1".to_string());
        let article = Article::new("Headline", "https://news.example.com/1", meta);
        articles.insert(&article).await.unwrap();

        let service = EnqueueService::new(
            Arc::clone(&articles),
            f.queue.clone(),
            Arc::clone(&f.published) as Arc<dyn PublishedStore>,
        );

        // First pass queues the article, the worker delivers it
        let added = service
            .add_articles_from_db(&crate::models::FilterConfig::default())
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(f.worker.process_batch().await.unwrap(), 1);

        let item = f.queue_store.get("YTN_1").await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
        assert!(f.published.contains("YTN_1").await.unwrap());

        // Second pass finds nothing new to queue
        let added = service
            .add_articles_from_db(&crate::models::FilterConfig::default())
            .await
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(f.target.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_honors_shutdown_while_idle() {
        let f = fixture(Mode::Deliver);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { f.worker.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap();
        assert!(result.is_ok());
    }
}
