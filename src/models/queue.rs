// src/models/queue.rs

//! Publish-queue data structures.
//!
//! A `QueueItem` is the publication-lifecycle record for one article. It
//! denormalizes the fields the publisher needs so that delivery never has
//! to read the article store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::article::Article;

/// Upper bound on stored failure messages.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1024;

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "processing" => Some(QueueStatus::Processing),
            "completed" => Some(QueueStatus::Completed),
            "failed" => Some(QueueStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One article waiting to be (or already) published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    /// Business key, unique across the queue store
    pub unique_id: String,

    /// Internal id of the article this item publishes
    pub article_id: String,

    /// Platform tag
    pub platform: String,

    /// Article title
    pub title: String,

    /// Article URL
    pub url: String,

    /// Body summary, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Category label, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Lifecycle state
    pub status: QueueStatus,

    /// Number of failed delivery attempts so far
    pub retry_count: u32,

    /// Failure message from the last attempt, set while FAILED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set when a worker claims the item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    /// Set when delivery succeeds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Build a pending item from a stored article.
    ///
    /// Fields the publisher needs are denormalized; `article_id` falls back
    /// to the composite identity for sources that assign no id of their own.
    pub fn from_article(article: &Article) -> Self {
        let now = Utc::now();
        Self {
            unique_id: article.unique_id.clone(),
            article_id: article
                .metadata
                .article_id
                .clone()
                .unwrap_or_else(|| article.unique_id.clone()),
            platform: article.metadata.platform.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            content: article.content.clone(),
            category: article.metadata.category.clone(),
            status: QueueStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            published_at: None,
        }
    }
}

/// Snapshot of per-status item counts.
///
/// Counts come from independent aggregations; under concurrent writers the
/// individual numbers are not guaranteed to be mutually consistent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    pub fn get(&self, status: QueueStatus) -> u64 {
        match status {
            QueueStatus::Pending => self.pending,
            QueueStatus::Processing => self.processing,
            QueueStatus::Completed => self.completed,
            QueueStatus::Failed => self.failed,
        }
    }

    pub fn bump(&mut self, status: QueueStatus) {
        self.add(status, 1);
    }

    pub fn add(&mut self, status: QueueStatus, count: u64) {
        match status {
            QueueStatus::Pending => self.pending += count,
            QueueStatus::Processing => self.processing += count,
            QueueStatus::Completed => self.completed += count,
            QueueStatus::Failed => self.failed += count,
        }
    }
}

/// Record of one successful delivery, kept by the published set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishedRecord {
    pub unique_id: String,

    /// Delivery channel label (e.g. "webhook")
    pub channel: String,

    pub published_at: DateTime<Utc>,
}

impl PublishedRecord {
    pub fn new(unique_id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            channel: channel.into(),
            published_at: Utc::now(),
        }
    }
}
