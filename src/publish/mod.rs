// src/publish/mod.rs

//! Delivery of queued articles to a chat target.
//!
//! The worker treats the target as opaque: anything implementing
//! [`ChatTarget`] can receive messages. Failure classification is the
//! target's job, because only it can see response semantics; the worker
//! maps `Transient` failures into the queue's retry cycle and `Permanent`
//! rejections into terminal failures.

pub mod discord;
pub mod format;
pub mod worker;

use async_trait::async_trait;

use crate::error::Result;

pub use discord::DiscordWebhook;
pub use worker::{run_maintenance, PublisherWorker};

/// Channel label recorded in the published set.
pub const DELIVERY_CHANNEL: &str = "webhook";

/// One outbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsMessage {
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub platform: String,
}

/// A chat destination.
#[async_trait]
pub trait ChatTarget: Send + Sync {
    /// Deliver one message.
    ///
    /// Implementations classify failures: `Transient` for anything worth
    /// retrying, `Permanent` for semantic rejections.
    async fn send(&self, message: &NewsMessage) -> Result<()>;
}
