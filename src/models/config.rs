// src/models/config.rs

//! Configuration structures.
//!
//! All sections deserialize from TOML with per-field defaults, so a partial
//! config file (or none at all) yields a runnable configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub queue: QueueConfig,
    pub publisher: PublisherConfig,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load configuration, falling back to defaults if loading fails.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "config not loaded, using defaults");
            Self::default()
        })
    }

    /// Pull secrets from the environment when present.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.publisher.webhook_url = url;
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }
    }
}

/// Crawler behavior settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CrawlerConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub request_delay_ms: u64,
    pub max_concurrent: usize,

    /// JTBC section codes to poll
    pub jtbc_sections: Vec<u32>,

    /// Number of YTN list pages to poll
    pub ytn_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; sokbo/0.4)".to_string(),
            timeout_secs: 30,
            request_delay_ms: 200,
            max_concurrent: 4,
            jtbc_sections: vec![10, 20, 30],
            ytn_pages: 3,
        }
    }
}

/// Queue engine settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueueConfig {
    /// Retry gate: FAILED items below this count go back to PENDING
    pub max_retries: u32,

    /// COMPLETED items older than this are deleted by `clean`
    pub clean_age_hours: u64,

    /// PROCESSING items claimed longer ago than this are swept back to PENDING
    pub stuck_threshold_secs: u64,

    /// Published-set records older than this are pruned.
    /// Must not be shorter than the enqueue look-back window.
    pub published_retention_days: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            clean_age_hours: 7 * 24,
            stuck_threshold_secs: 600,
            published_retention_days: 30,
        }
    }
}

impl QueueConfig {
    pub fn clean_age(&self) -> Duration {
        Duration::from_secs(self.clean_age_hours * 3600)
    }

    pub fn stuck_threshold(&self) -> Duration {
        Duration::from_secs(self.stuck_threshold_secs)
    }

    pub fn published_retention(&self) -> Duration {
        Duration::from_secs(self.published_retention_days * 24 * 3600)
    }
}

/// Publisher worker settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PublisherConfig {
    /// Max items claimed per iteration
    pub batch_size: usize,

    /// Idle sleep when a claim returns nothing
    pub publish_interval_secs: u64,

    /// Bound on concurrent sends within a batch
    pub max_concurrent_sends: usize,

    /// Run retry/clean/stuck-sweep every N iterations
    pub maintenance_every: u64,

    /// Discord webhook URL; usually supplied via environment
    pub webhook_url: String,

    /// Embed accent color
    pub embed_color: u32,

    /// Embed footer text
    pub footer_text: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            publish_interval_secs: 60,
            max_concurrent_sends: 4,
            maintenance_every: 10,
            webhook_url: String::new(),
            embed_color: 0x3498DB,
            footer_text: "sokbo news".to_string(),
        }
    }
}

impl PublisherConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs)
    }
}

/// Enqueue selection filters
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Restrict to these platform tags; empty means all
    pub platforms: Vec<String>,

    /// Restrict to these categories; empty means all
    pub categories: Vec<String>,

    /// Look-back window in hours; absent means unbounded
    pub hours: Option<i64>,

    /// Cap on articles considered per run
    pub limit: Option<usize>,
}

/// Database settings (used by the `postgres` feature)
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}
