// src/pipeline/publish.rs

//! Wiring for the publisher worker loop.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;
use crate::models::Config;
use crate::publish::{ChatTarget, DiscordWebhook, PublisherWorker};
use crate::queue::QueueEngine;
use crate::storage::PublishedStore;
use crate::utils::create_client;

/// Build the Discord target from configuration.
pub fn build_target(config: &Config) -> Result<Arc<dyn ChatTarget>> {
    let client = create_client(&config.crawler)?;
    Ok(Arc::new(DiscordWebhook::new(client, &config.publisher)?))
}

/// Run the publisher worker until the shutdown flag flips.
pub async fn run_publisher(
    config: &Config,
    queue: QueueEngine,
    published: Arc<dyn PublishedStore>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let target = build_target(config)?;
    let worker = PublisherWorker::new(
        queue,
        published,
        target,
        config.queue.clone(),
        config.publisher.clone(),
    );
    worker.run(shutdown).await
}
