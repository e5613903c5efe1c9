// src/models/article.rs

//! Article data structures.
//!
//! An article is the normalized record a source adapter produces. Its
//! identity is the composite `unique_id`, derived from the platform tag
//! and the source-assigned article id when one exists, falling back to a
//! hash of the canonical URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Source-level metadata attached to an article.
///
/// `platform_specific` is an opaque key/value bag persisted verbatim;
/// sources store category codes, video ids, thumbnails and similar fields
/// there without a shared schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleMetadata {
    /// Platform tag (e.g. "YTN", "MBC", "JTBC")
    pub platform: String,

    /// Category label, if the source exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Source-assigned article identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,

    /// When the platform published the article
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// When this system collected the article
    pub collected_at: DateTime<Utc>,

    /// Source-specific fields, stored as-is
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub platform_specific: Map<String, Value>,
}

impl ArticleMetadata {
    /// Minimal metadata for a platform, collected now.
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            category: None,
            tags: Vec::new(),
            article_id: None,
            published_at: None,
            collected_at: Utc::now(),
            platform_specific: Map::new(),
        }
    }
}

/// A collected news article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Composite identity: `{platform}_{article_id}` or `{platform}_{url hash}`
    pub unique_id: String,

    /// Article title
    pub title: String,

    /// Absolute canonical URL
    pub url: String,

    /// Reporter name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Body text or summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Source metadata
    pub metadata: ArticleMetadata,
}

impl Article {
    /// Build an article, deriving `unique_id` from the metadata.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        metadata: ArticleMetadata,
    ) -> Self {
        let url = url.into();
        let unique_id = derive_unique_id(&metadata.platform, metadata.article_id.as_deref(), &url);
        Self {
            unique_id,
            title: title.into(),
            url,
            author: None,
            content: None,
            metadata,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Platform tag shortcut.
    pub fn platform(&self) -> &str {
        &self.metadata.platform
    }

    /// Check the fields every stored article must carry.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.platform.trim().is_empty() {
            return Err(AppError::invalid_input("article platform is empty"));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::invalid_input("article title is empty"));
        }
        if self.url.trim().is_empty() {
            return Err(AppError::invalid_input("article url is empty"));
        }
        if self.metadata.collected_at > Utc::now() {
            return Err(AppError::invalid_input("collected_at is in the future"));
        }
        Ok(())
    }
}

/// Derive the composite identity for an article.
///
/// Sources that expose their own article id get `{platform}_{article_id}`;
/// the rest fall back to a SHA-256 of the canonical URL so the identity
/// stays stable across crawls.
pub fn derive_unique_id(platform: &str, article_id: Option<&str>, url: &str) -> String {
    match article_id {
        Some(id) if !id.trim().is_empty() => format!("{}_{}", platform, id.trim()),
        _ => {
            let mut hasher = Sha256::new();
            hasher.update(url.trim().to_lowercase().as_bytes());
            let digest = hasher.finalize();
            format!("{}_{}", platform, hex::encode(digest))
        }
    }
}
