// src/pipeline/mod.rs

//! Pipeline entry points for CLI commands.

pub mod crawl;
pub mod enqueue;
pub mod publish;

pub use crawl::{run_crawl, store_articles, CrawlSummary};
pub use enqueue::EnqueueService;
pub use publish::run_publisher;
