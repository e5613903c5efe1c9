// src/storage/postgres.rs

//! Postgres store backends (feature `postgres`).
//!
//! The queue table carries a unique index on `unique_id` and a secondary
//! index on `(status, created_at)` so the FIFO claim scan stays cheap. The
//! PENDING -> PROCESSING claim is a single conditional UPDATE, which gives
//! the linearizability the engine's claim protocol relies on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::error::{AppError, Result};
use crate::models::{
    Article, ArticleMetadata, PublishedRecord, QueueCounts, QueueItem, QueueStatus,
};
use crate::storage::{ArticleQuery, ArticleStore, PublishedStore, QueueStore};

/// Open a connection pool against the configured database.
pub async fn connect(url: &str) -> Result<PgPool> {
    if url.trim().is_empty() {
        return Err(AppError::config("database.url is empty"));
    }
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS articles (
            id BIGSERIAL PRIMARY KEY,
            unique_id TEXT NOT NULL UNIQUE,
            platform TEXT NOT NULL,
            article_id TEXT,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            content TEXT,
            author TEXT,
            category TEXT,
            tags JSONB NOT NULL DEFAULT '[]',
            platform_specific JSONB NOT NULL DEFAULT '{}',
            published_at TIMESTAMPTZ,
            collected_at TIMESTAMPTZ NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_platform_collected
         ON articles (platform, collected_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS queue_items (
            id BIGSERIAL PRIMARY KEY,
            unique_id TEXT NOT NULL UNIQUE,
            article_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            content TEXT,
            category TEXT,
            status TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            claimed_at TIMESTAMPTZ,
            published_at TIMESTAMPTZ
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_status_created
         ON queue_items (status, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS published_articles (
            unique_id TEXT PRIMARY KEY,
            channel TEXT NOT NULL,
            published_at TIMESTAMPTZ NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Postgres-backed article store.
#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_article(row: PgRow) -> Result<Article> {
        let tags: Value = row.try_get("tags")?;
        let platform_specific: Value = row.try_get("platform_specific")?;

        let metadata = ArticleMetadata {
            platform: row.try_get("platform")?,
            category: row.try_get("category")?,
            tags: serde_json::from_value(tags)?,
            article_id: row.try_get("article_id")?,
            published_at: row.try_get("published_at")?,
            collected_at: row.try_get("collected_at")?,
            platform_specific: match platform_specific {
                Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        };

        Ok(Article {
            unique_id: row.try_get("unique_id")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            author: row.try_get("author")?,
            content: row.try_get("content")?,
            metadata,
        })
    }
}

const ARTICLE_COLUMNS: &str = "unique_id, platform, article_id, url, title, content, author, \
     category, tags, platform_specific, published_at, collected_at";

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn insert(&self, article: &Article) -> Result<u64> {
        article.validate()?;

        let result = sqlx::query(
            r"
            INSERT INTO articles
                (unique_id, platform, article_id, url, title, content, author,
                 category, tags, platform_specific, published_at, collected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            ",
        )
        .bind(&article.unique_id)
        .bind(&article.metadata.platform)
        .bind(&article.metadata.article_id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.author)
        .bind(&article.metadata.category)
        .bind(serde_json::to_value(&article.metadata.tags)?)
        .bind(Value::Object(article.metadata.platform_specific.clone()))
        .bind(article.metadata.published_at)
        .bind(article.metadata.collected_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let id: i64 = row.try_get("id")?;
                Ok(id as u64)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(AppError::duplicate(article.unique_id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_unique_id(&self, unique_id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE unique_id = $1"
        ))
        .bind(unique_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_article).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE url = $1"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_article).transpose()
    }

    async fn find(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        // LIMIT NULL is Postgres for "no limit"
        let rows = sqlx::query(&format!(
            r"
            SELECT {ARTICLE_COLUMNS} FROM articles
            WHERE ($1::text IS NULL OR platform = $1)
              AND ($2::text IS NULL OR category = $2)
              AND ($3::timestamptz IS NULL OR collected_at >= $3)
            ORDER BY collected_at DESC
            LIMIT $4
            "
        ))
        .bind(query.platform.as_deref())
        .bind(query.category.as_deref())
        .bind(query.since)
        .bind(query.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_article).collect()
    }
}

/// Postgres-backed queue store.
#[derive(Clone)]
pub struct PgQueueStore {
    pool: PgPool,
}

impl PgQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: PgRow) -> Result<QueueItem> {
        let status_str: String = row.try_get("status")?;
        let status = QueueStatus::parse(&status_str)
            .ok_or_else(|| AppError::storage(format!("invalid queue status '{status_str}'")))?;
        let retry_count: i32 = row.try_get("retry_count")?;

        Ok(QueueItem {
            unique_id: row.try_get("unique_id")?,
            article_id: row.try_get("article_id")?,
            platform: row.try_get("platform")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            content: row.try_get("content")?,
            category: row.try_get("category")?,
            status,
            retry_count: retry_count.max(0) as u32,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            claimed_at: row.try_get("claimed_at")?,
            published_at: row.try_get("published_at")?,
        })
    }
}

const QUEUE_COLUMNS: &str = "unique_id, article_id, platform, title, url, content, category, \
     status, retry_count, error_message, created_at, updated_at, claimed_at, published_at";

#[async_trait]
impl QueueStore for PgQueueStore {
    async fn insert(&self, item: &QueueItem) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO queue_items
                (unique_id, article_id, platform, title, url, content, category,
                 status, retry_count, error_message, created_at, updated_at,
                 claimed_at, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(&item.unique_id)
        .bind(&item.article_id)
        .bind(&item.platform)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.content)
        .bind(&item.category)
        .bind(item.status.as_str())
        .bind(item.retry_count as i32)
        .bind(&item.error_message)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(item.claimed_at)
        .bind(item.published_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, unique_id: &str) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue_items WHERE unique_id = $1"
        ))
        .bind(unique_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_item).transpose()
    }

    async fn exists(&self, unique_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM queue_items WHERE unique_id = $1")
            .bind(unique_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn pending_batch(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {QUEUE_COLUMNS} FROM queue_items
            WHERE status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn claim_pending(
        &self,
        unique_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            r"
            UPDATE queue_items
            SET status = 'processing', claimed_at = $2, updated_at = $2
            WHERE unique_id = $1 AND status = 'pending'
            RETURNING {QUEUE_COLUMNS}
            "
        ))
        .bind(unique_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_item).transpose()
    }

    async fn complete_processing(&self, unique_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE queue_items
            SET status = 'completed', published_at = $2, updated_at = $2,
                error_message = NULL
            WHERE unique_id = $1 AND status = 'processing'
            ",
        )
        .bind(unique_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fail_processing(
        &self,
        unique_id: &str,
        error: &str,
        now: DateTime<Utc>,
        retry_floor: Option<u32>,
    ) -> Result<bool> {
        let floor = retry_floor.unwrap_or(0) as i32;
        let result = sqlx::query(
            r"
            UPDATE queue_items
            SET status = 'failed', error_message = $2,
                retry_count = GREATEST(retry_count + 1, $3), updated_at = $4
            WHERE unique_id = $1 AND status = 'processing'
            ",
        )
        .bind(unique_id)
        .bind(error)
        .bind(floor)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retry_failed(&self, max_retries: u32, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE queue_items
            SET status = 'pending', error_message = NULL, updated_at = $2
            WHERE status = 'failed' AND retry_count < $1
            ",
        )
        .bind(max_retries as i32)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn release_stuck(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE queue_items
            SET status = 'pending', claimed_at = NULL,
                retry_count = retry_count + 1, updated_at = $2
            WHERE status = 'processing' AND claimed_at < $1
            ",
        )
        .bind(cutoff)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM queue_items WHERE status = 'completed' AND updated_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn status_counts(&self) -> Result<QueueCounts> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM queue_items GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let status_str: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            if let Some(status) = QueueStatus::parse(&status_str) {
                counts.add(status, count.max(0) as u64);
            }
        }
        Ok(counts)
    }
}

/// Postgres-backed published set.
#[derive(Clone)]
pub struct PgPublishedStore {
    pool: PgPool,
}

impl PgPublishedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PublishedStore for PgPublishedStore {
    async fn contains(&self, unique_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM published_articles WHERE unique_id = $1")
            .bind(unique_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn add(&self, record: &PublishedRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO published_articles (unique_id, channel, published_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (unique_id) DO NOTHING
            ",
        )
        .bind(&record.unique_id)
        .bind(&record.channel)
        .bind(record.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM published_articles WHERE published_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
