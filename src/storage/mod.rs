// src/storage/mod.rs

//! Store interfaces for articles, queue items, and the published set.
//!
//! Each store is a narrow async interface with two backends: the in-memory
//! implementation used by tests and single-process runs, and a Postgres
//! implementation behind the `postgres` feature. Handles are injected into
//! the components that need them; there is no process-global store.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Article, PublishedRecord, QueueCounts, QueueItem};

pub use memory::{MemoryArticleStore, MemoryPublishedStore, MemoryQueueStore};

/// Selection filters for [`ArticleStore::find`].
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Restrict to one platform tag
    pub platform: Option<String>,

    /// Restrict to one category label
    pub category: Option<String>,

    /// Only articles collected at or after this instant
    pub since: Option<DateTime<Utc>>,

    /// Bound on the result length
    pub limit: Option<usize>,
}

impl ArticleQuery {
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Durable collection of collected articles.
///
/// `unique_id` and `url` are both unique within the store; articles are
/// never mutated after insertion.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert an article and return its internal id.
    ///
    /// Fails with `Duplicate` when an article with the same `unique_id` or
    /// `url` already exists, and with `InvalidInput` when required fields
    /// are missing.
    async fn insert(&self, article: &Article) -> Result<u64>;

    async fn find_by_unique_id(&self, unique_id: &str) -> Result<Option<Article>>;

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Query articles, newest first by `collected_at`.
    async fn find(&self, query: &ArticleQuery) -> Result<Vec<Article>>;
}

/// Durable collection of queue items keyed by `unique_id`.
///
/// This is the persistence primitive under the queue engine. The only
/// operation that must be linearizable is [`claim_pending`]; every other
/// write acts on a known owner and needs single-row atomicity only.
///
/// [`claim_pending`]: QueueStore::claim_pending
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new item. Returns `false` on a `unique_id` conflict.
    async fn insert(&self, item: &QueueItem) -> Result<bool>;

    async fn get(&self, unique_id: &str) -> Result<Option<QueueItem>>;

    /// Whether any row (in any status) exists with this id.
    async fn exists(&self, unique_id: &str) -> Result<bool>;

    /// Up to `limit` PENDING items, oldest `created_at` first; ties break
    /// by insertion id ascending.
    async fn pending_batch(&self, limit: usize) -> Result<Vec<QueueItem>>;

    /// Compare-and-swap PENDING -> PROCESSING.
    ///
    /// Succeeds only if the persisted row is still PENDING, setting
    /// `claimed_at` and `updated_at`; returns the updated row. Returns
    /// `None` when another worker won the race.
    async fn claim_pending(
        &self,
        unique_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>>;

    /// PROCESSING -> COMPLETED; sets `published_at`, clears `error_message`.
    /// Returns `false` when the item is missing or not PROCESSING.
    async fn complete_processing(&self, unique_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// PROCESSING -> FAILED; records the error and bumps `retry_count`.
    ///
    /// When `retry_floor` is given the count is raised at least to that
    /// value, which lets callers park permanently rejected items beyond
    /// the retry gate. Returns `false` when the item is missing or not
    /// PROCESSING.
    async fn fail_processing(
        &self,
        unique_id: &str,
        error: &str,
        now: DateTime<Utc>,
        retry_floor: Option<u32>,
    ) -> Result<bool>;

    /// FAILED -> PENDING for every item with `retry_count < max_retries`,
    /// clearing `error_message`. Returns the number of items moved.
    async fn retry_failed(&self, max_retries: u32, now: DateTime<Utc>) -> Result<u64>;

    /// PROCESSING -> PENDING for items claimed before `cutoff`, bumping
    /// `retry_count`. Covers workers that died without reporting.
    async fn release_stuck(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64>;

    /// Delete COMPLETED items with `updated_at` strictly before `cutoff`.
    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn status_counts(&self) -> Result<QueueCounts>;
}

/// Set of identities that have already been delivered.
///
/// Used by the enqueue pipeline as its idempotence guard.
#[async_trait]
pub trait PublishedStore: Send + Sync {
    async fn contains(&self, unique_id: &str) -> Result<bool>;

    /// Record a delivery. Adding an already-present id is a silent no-op.
    async fn add(&self, record: &PublishedRecord) -> Result<()>;

    /// Delete records published strictly before `cutoff`.
    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
