// src/storage/memory.rs

//! In-memory store backends.
//!
//! Used by tests and by single-process runs without a database. The queue
//! store keeps one mutex-guarded map as its single source of truth, so the
//! PENDING -> PROCESSING claim is atomic under concurrent workers exactly
//! like the conditional update of the Postgres backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Article, PublishedRecord, QueueCounts, QueueItem, QueueStatus};
use crate::storage::{ArticleQuery, ArticleStore, PublishedStore, QueueStore};

#[derive(Default)]
struct ArticleState {
    next_id: u64,
    by_unique_id: HashMap<String, (u64, Article)>,
    ids_by_url: HashMap<String, u64>,
}

/// In-memory article store.
#[derive(Default)]
pub struct MemoryArticleStore {
    state: Mutex<ArticleState>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn insert(&self, article: &Article) -> Result<u64> {
        article.validate()?;

        let mut state = self.state.lock().await;
        if state.by_unique_id.contains_key(&article.unique_id) {
            return Err(AppError::duplicate(article.unique_id.clone()));
        }
        if state.ids_by_url.contains_key(&article.url) {
            return Err(AppError::duplicate(article.url.clone()));
        }

        state.next_id += 1;
        let id = state.next_id;
        state
            .by_unique_id
            .insert(article.unique_id.clone(), (id, article.clone()));
        state.ids_by_url.insert(article.url.clone(), id);
        Ok(id)
    }

    async fn find_by_unique_id(&self, unique_id: &str) -> Result<Option<Article>> {
        let state = self.state.lock().await;
        Ok(state
            .by_unique_id
            .get(unique_id)
            .map(|(_, article)| article.clone()))
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let state = self.state.lock().await;
        Ok(state
            .by_unique_id
            .values()
            .find(|(_, article)| article.url == url)
            .map(|(_, article)| article.clone()))
    }

    async fn find(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let state = self.state.lock().await;
        let mut matches: Vec<Article> = state
            .by_unique_id
            .values()
            .filter(|(_, article)| {
                query
                    .platform
                    .as_deref()
                    .is_none_or(|p| article.metadata.platform == p)
            })
            .filter(|(_, article)| {
                query
                    .category
                    .as_deref()
                    .is_none_or(|c| article.metadata.category.as_deref() == Some(c))
            })
            .filter(|(_, article)| {
                query
                    .since
                    .is_none_or(|since| article.metadata.collected_at >= since)
            })
            .map(|(_, article)| article.clone())
            .collect();

        matches.sort_by(|a, b| b.metadata.collected_at.cmp(&a.metadata.collected_at));
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }
}

struct StoredItem {
    seq: u64,
    item: QueueItem,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    items: HashMap<String, StoredItem>,
}

/// In-memory queue store.
#[derive(Default)]
pub struct MemoryQueueStore {
    state: Mutex<QueueState>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn insert(&self, item: &QueueItem) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.items.contains_key(&item.unique_id) {
            return Ok(false);
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.items.insert(
            item.unique_id.clone(),
            StoredItem {
                seq,
                item: item.clone(),
            },
        );
        Ok(true)
    }

    async fn get(&self, unique_id: &str) -> Result<Option<QueueItem>> {
        let state = self.state.lock().await;
        Ok(state.items.get(unique_id).map(|stored| stored.item.clone()))
    }

    async fn exists(&self, unique_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.items.contains_key(unique_id))
    }

    async fn pending_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let state = self.state.lock().await;
        let mut pending: Vec<(&StoredItem, &QueueItem)> = state
            .items
            .values()
            .filter(|stored| stored.item.status == QueueStatus::Pending)
            .map(|stored| (stored, &stored.item))
            .collect();
        pending.sort_by_key(|(stored, item)| (item.created_at, stored.seq));
        Ok(pending
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn claim_pending(
        &self,
        unique_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.items.get_mut(unique_id) else {
            return Ok(None);
        };
        if stored.item.status != QueueStatus::Pending {
            return Ok(None);
        }
        stored.item.status = QueueStatus::Processing;
        stored.item.claimed_at = Some(now);
        stored.item.updated_at = now;
        Ok(Some(stored.item.clone()))
    }

    async fn complete_processing(&self, unique_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.items.get_mut(unique_id) else {
            return Ok(false);
        };
        if stored.item.status != QueueStatus::Processing {
            return Ok(false);
        }
        stored.item.status = QueueStatus::Completed;
        stored.item.published_at = Some(now);
        stored.item.updated_at = now;
        stored.item.error_message = None;
        Ok(true)
    }

    async fn fail_processing(
        &self,
        unique_id: &str,
        error: &str,
        now: DateTime<Utc>,
        retry_floor: Option<u32>,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.items.get_mut(unique_id) else {
            return Ok(false);
        };
        if stored.item.status != QueueStatus::Processing {
            return Ok(false);
        }
        stored.item.status = QueueStatus::Failed;
        stored.item.error_message = Some(error.to_string());
        stored.item.retry_count += 1;
        if let Some(floor) = retry_floor {
            stored.item.retry_count = stored.item.retry_count.max(floor);
        }
        stored.item.updated_at = now;
        Ok(true)
    }

    async fn retry_failed(&self, max_retries: u32, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut moved = 0;
        for stored in state.items.values_mut() {
            if stored.item.status == QueueStatus::Failed && stored.item.retry_count < max_retries {
                stored.item.status = QueueStatus::Pending;
                stored.item.error_message = None;
                stored.item.updated_at = now;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn release_stuck(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut released = 0;
        for stored in state.items.values_mut() {
            let claimed_before_cutoff = stored
                .item
                .claimed_at
                .is_some_and(|claimed| claimed < cutoff);
            if stored.item.status == QueueStatus::Processing && claimed_before_cutoff {
                stored.item.status = QueueStatus::Pending;
                stored.item.claimed_at = None;
                stored.item.retry_count += 1;
                stored.item.updated_at = now;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|_, stored| {
            !(stored.item.status == QueueStatus::Completed && stored.item.updated_at < cutoff)
        });
        Ok((before - state.items.len()) as u64)
    }

    async fn status_counts(&self) -> Result<QueueCounts> {
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for stored in state.items.values() {
            counts.bump(stored.item.status);
        }
        Ok(counts)
    }
}

/// In-memory published set.
#[derive(Default)]
pub struct MemoryPublishedStore {
    records: Mutex<HashMap<String, PublishedRecord>>,
}

impl MemoryPublishedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PublishedStore for MemoryPublishedStore {
    async fn contains(&self, unique_id: &str) -> Result<bool> {
        let records = self.records.lock().await;
        Ok(records.contains_key(unique_id))
    }

    async fn add(&self, record: &PublishedRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        records
            .entry(record.unique_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.published_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::models::ArticleMetadata;

    fn sample_article(platform: &str, article_id: &str) -> Article {
        let mut meta = ArticleMetadata::new(platform);
        meta.article_id = Some(article_id.to_string());
        meta.category = Some("politics".to_string());
        Article::new(
            format!("Headline {article_id}"),
            format!("https://news.example.com/{platform}/{article_id}"),
            meta,
        )
    }

    fn sample_item(unique_id: &str) -> QueueItem {
        let now = Utc::now();
        QueueItem {
            unique_id: unique_id.to_string(),
            article_id: "1".to_string(),
            platform: "YTN".to_string(),
            title: "Headline".to_string(),
            url: format!("https://news.example.com/{unique_id}"),
            content: None,
            category: None,
            status: QueueStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_article_insert_rejects_duplicates() {
        let store = MemoryArticleStore::new();
        let article = sample_article("YTN", "100");
        store.insert(&article).await.unwrap();

        // Same unique_id
        let err = store.insert(&article).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));

        // Different unique_id, same URL
        let mut clone = sample_article("YTN", "101");
        clone.url = article.url.clone();
        let err = store.insert(&clone).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_article_find_filters_and_orders() {
        let store = MemoryArticleStore::new();
        let now = Utc::now();

        let mut old = sample_article("YTN", "1");
        old.metadata.collected_at = now - Duration::hours(30);
        let mut recent = sample_article("YTN", "2");
        recent.metadata.collected_at = now - Duration::hours(1);
        let mut other = sample_article("MBC", "3");
        other.metadata.collected_at = now - Duration::hours(2);

        store.insert(&old).await.unwrap();
        store.insert(&recent).await.unwrap();
        store.insert(&other).await.unwrap();

        let all = store.find(&ArticleQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].unique_id, "YTN_2");
        assert_eq!(all[2].unique_id, "YTN_1");

        let ytn_only = store
            .find(&ArticleQuery::default().platform("YTN"))
            .await
            .unwrap();
        assert_eq!(ytn_only.len(), 2);

        let since = store
            .find(&ArticleQuery::default().since(now - Duration::hours(24)))
            .await
            .unwrap();
        assert_eq!(since.len(), 2);

        let limited = store
            .find(&ArticleQuery::default().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].unique_id, "YTN_2");
    }

    #[tokio::test]
    async fn test_queue_insert_conflict_returns_false() {
        let store = MemoryQueueStore::new();
        assert!(store.insert(&sample_item("u1")).await.unwrap());
        assert!(!store.insert(&sample_item("u1")).await.unwrap());
        assert!(store.exists("u1").await.unwrap());
        assert!(!store.exists("u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_across_tasks() {
        let store = Arc::new(MemoryQueueStore::new());
        store.insert(&sample_item("u1")).await.unwrap();

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.claim_pending("u1", Utc::now()).await.unwrap() })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.claim_pending("u1", Utc::now()).await.unwrap() })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() ^ b.is_some());

        let claimed = a.or(b).unwrap();
        assert_eq!(claimed.status, QueueStatus::Processing);
        assert!(claimed.claimed_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_floor_parks_item_beyond_gate() {
        let store = MemoryQueueStore::new();
        store.insert(&sample_item("u1")).await.unwrap();
        store.claim_pending("u1", Utc::now()).await.unwrap();

        store
            .fail_processing("u1", "forbidden channel", Utc::now(), Some(3))
            .await
            .unwrap();

        let item = store.get("u1").await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 3);

        // Below the gate nothing moves
        assert_eq!(store.retry_failed(3, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_stuck_only_touches_old_claims() {
        let store = MemoryQueueStore::new();
        store.insert(&sample_item("old")).await.unwrap();
        store.insert(&sample_item("fresh")).await.unwrap();

        let long_ago = Utc::now() - Duration::minutes(30);
        store.claim_pending("old", long_ago).await.unwrap();
        store.claim_pending("fresh", Utc::now()).await.unwrap();

        let cutoff = Utc::now() - Duration::minutes(10);
        assert_eq!(store.release_stuck(cutoff, Utc::now()).await.unwrap(), 1);

        let old = store.get("old").await.unwrap().unwrap();
        assert_eq!(old.status, QueueStatus::Pending);
        assert_eq!(old.retry_count, 1);
        assert!(old.claimed_at.is_none());

        let fresh = store.get("fresh").await.unwrap().unwrap();
        assert_eq!(fresh.status, QueueStatus::Processing);
    }

    #[tokio::test]
    async fn test_delete_completed_is_age_and_status_bounded() {
        let store = MemoryQueueStore::new();
        let now = Utc::now();

        let mut old_done = sample_item("old_done");
        old_done.status = QueueStatus::Completed;
        old_done.updated_at = now - Duration::days(8);

        let mut fresh_done = sample_item("fresh_done");
        fresh_done.status = QueueStatus::Completed;
        fresh_done.updated_at = now - Duration::days(1);

        let mut old_failed = sample_item("old_failed");
        old_failed.status = QueueStatus::Failed;
        old_failed.updated_at = now - Duration::days(8);

        store.insert(&old_done).await.unwrap();
        store.insert(&fresh_done).await.unwrap();
        store.insert(&old_failed).await.unwrap();

        let cutoff = now - Duration::days(7);
        assert_eq!(store.delete_completed_before(cutoff).await.unwrap(), 1);
        assert!(!store.exists("old_done").await.unwrap());
        assert!(store.exists("fresh_done").await.unwrap());
        assert!(store.exists("old_failed").await.unwrap());
    }

    #[tokio::test]
    async fn test_published_add_is_idempotent() {
        let store = MemoryPublishedStore::new();
        let record = PublishedRecord::new("u1", "webhook");
        store.add(&record).await.unwrap();
        store.add(&record).await.unwrap();
        assert!(store.contains("u1").await.unwrap());
        assert!(!store.contains("u2").await.unwrap());

        let pruned = store.prune(Utc::now() + Duration::seconds(1)).await.unwrap();
        assert_eq!(pruned, 1);
        assert!(!store.contains("u1").await.unwrap());
    }
}
