// src/queue.rs

//! The publish-queue engine.
//!
//! State machine over queue items:
//!
//! ```text
//! [new] --enqueue--> PENDING --claim--> PROCESSING --complete--> COMPLETED
//!                       ^                    |
//!                       '----- retry ----- FAILED
//! ```
//!
//! The engine owns every transition; nothing else writes queue rows. The
//! store's conditional PENDING -> PROCESSING update is the one primitive
//! that must be linearizable: it guarantees that no two workers ever hold
//! the same item in PROCESSING. The remaining transitions act on an item
//! whose claim the caller already holds and need only single-row writes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{QueueCounts, QueueItem, QueueStatus, MAX_ERROR_MESSAGE_LEN};
use crate::storage::QueueStore;

/// Bound a failure message before persisting it.
fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        message.to_string()
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}

/// `now - duration`, saturating at the epoch floor for absurd windows.
fn cutoff_before_now(duration: Duration) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_sub_signed(delta)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Engine over a queue store; cheap to clone and share between tasks.
#[derive(Clone)]
pub struct QueueEngine {
    store: Arc<dyn QueueStore>,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Insert a new item in PENDING.
    ///
    /// Returns `true` when the item was inserted and `false` on a
    /// `unique_id` conflict, including conflicts raced in by a concurrent
    /// enqueue. Storage failures propagate.
    pub async fn enqueue(&self, mut item: QueueItem) -> Result<bool> {
        let now = Utc::now();
        item.status = QueueStatus::Pending;
        item.error_message = None;
        item.claimed_at = None;
        item.published_at = None;
        item.created_at = now;
        item.updated_at = now;

        if self.store.exists(&item.unique_id).await? {
            debug!(unique_id = %item.unique_id, "skipping duplicate queue item");
            return Ok(false);
        }

        let inserted = self.store.insert(&item).await?;
        if inserted {
            info!(unique_id = %item.unique_id, platform = %item.platform, "article queued");
        } else {
            // Lost an insert race after the exists() check
            debug!(unique_id = %item.unique_id, "concurrent enqueue won the insert");
        }
        Ok(inserted)
    }

    /// Claim up to `limit` pending items, oldest first.
    ///
    /// Each candidate is taken with a conditional update that succeeds only
    /// while the row is still PENDING; candidates lost to another worker
    /// are simply skipped, so the returned batch may be shorter than
    /// `limit` and an item is never handed to two callers.
    pub async fn claim(&self, limit: usize) -> Result<Vec<QueueItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let candidates = self.store.pending_batch(limit).await?;
        let mut claimed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if claimed.len() >= limit {
                break;
            }
            if let Some(item) = self.store.claim_pending(&candidate.unique_id, now).await? {
                claimed.push(item);
            }
        }

        if !claimed.is_empty() {
            debug!(count = claimed.len(), "claimed queue items");
        }
        Ok(claimed)
    }

    /// Mark a claimed item as delivered.
    ///
    /// No-op returning `false` unless the item is currently PROCESSING.
    pub async fn complete(&self, unique_id: &str) -> Result<bool> {
        let done = self.store.complete_processing(unique_id, Utc::now()).await?;
        if done {
            info!(unique_id, "item published");
        } else {
            warn!(unique_id, "complete ignored: item not in processing");
        }
        Ok(done)
    }

    /// Mark a claimed item as failed and bump its retry count.
    ///
    /// The message is truncated before storage. No-op returning `false`
    /// unless the item is currently PROCESSING, so repeated failure
    /// reports for an already-failed item change nothing.
    pub async fn fail(&self, unique_id: &str, error: &str) -> Result<bool> {
        let failed = self
            .store
            .fail_processing(unique_id, &truncate_error(error), Utc::now(), None)
            .await?;
        if failed {
            warn!(unique_id, error, "item failed");
        } else {
            warn!(unique_id, "fail ignored: item not in processing");
        }
        Ok(failed)
    }

    /// Mark a claimed item as failed with no retry eligibility left.
    ///
    /// Used for deliveries the target rejected outright: the retry count
    /// is floored at `max_retries` so the retry sweep never requeues it.
    pub async fn fail_permanently(
        &self,
        unique_id: &str,
        error: &str,
        max_retries: u32,
    ) -> Result<bool> {
        let failed = self
            .store
            .fail_processing(
                unique_id,
                &truncate_error(error),
                Utc::now(),
                Some(max_retries),
            )
            .await?;
        if failed {
            warn!(unique_id, error, "item rejected permanently");
        }
        Ok(failed)
    }

    /// Move FAILED items below the retry gate back to PENDING.
    ///
    /// `retry_count` is left as-is; it only ever grows.
    pub async fn retry(&self, max_retries: u32) -> Result<u64> {
        let moved = self.store.retry_failed(max_retries, Utc::now()).await?;
        if moved > 0 {
            info!(moved, "failed items requeued for retry");
        }
        Ok(moved)
    }

    /// Whether any row exists with this id, in any status.
    pub async fn is_duplicate(&self, unique_id: &str) -> Result<bool> {
        self.store.exists(unique_id).await
    }

    /// Per-status counts. A snapshot only; the numbers come from one
    /// aggregation pass and may lag concurrent transitions.
    pub async fn status(&self) -> Result<QueueCounts> {
        self.store.status_counts().await
    }

    /// Delete COMPLETED items older than `age`.
    pub async fn clean(&self, age: Duration) -> Result<u64> {
        let cutoff = cutoff_before_now(age);
        let deleted = self.store.delete_completed_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, "completed items cleaned from queue");
        }
        Ok(deleted)
    }

    /// Sweep PROCESSING items whose claim is older than `threshold` back
    /// to PENDING, counting the lost attempt.
    pub async fn release_stuck(&self, threshold: Duration) -> Result<u64> {
        let cutoff = cutoff_before_now(threshold);
        let released = self.store.release_stuck(cutoff, Utc::now()).await?;
        if released > 0 {
            warn!(released, "stuck claims released back to pending");
        }
        Ok(released)
    }
}
