//! sokbo
//!
//! Breaking-news collector with a durable publish queue and Discord
//! delivery.
//!
//! # Architecture
//!
//! - `models`: Data structures (Article, QueueItem, Config)
//! - `storage`: Store interfaces with memory and Postgres backends
//! - `queue`: The publish-queue engine (claim/complete/fail/retry/clean)
//! - `sources`: Per-platform adapters and the concurrent crawl fan-out
//! - `publish`: Chat-target interface, Discord webhook, worker loop
//! - `pipeline`: High-level operations behind the CLI commands
//! - `utils`: Shared utilities (HTTP client, text cleanup)
//! - `error`: Unified error handling

pub mod error;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod queue;
pub mod sources;
pub mod storage;
pub mod utils;

// Re-export commonly used items
pub use error::{AppError, Result};
pub use queue::QueueEngine;
