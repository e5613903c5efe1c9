// src/models/mod.rs

//! Data structures shared across the pipeline.

pub mod article;
pub mod config;
pub mod queue;

pub use article::{derive_unique_id, Article, ArticleMetadata};
pub use config::{
    Config, CrawlerConfig, DatabaseConfig, FilterConfig, PublisherConfig, QueueConfig,
};
pub use queue::{PublishedRecord, QueueCounts, QueueItem, QueueStatus, MAX_ERROR_MESSAGE_LEN};
