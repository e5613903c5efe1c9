// src/error.rs

//! Unified error handling for the news pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// The publishing pipeline distinguishes four delivery-relevant classes:
/// `InvalidInput` and `Duplicate` are caller errors, `Transient` failures
/// are eligible for the queue's retry cycle, `Permanent` failures are not.
/// `Storage` errors always propagate out of the queue engine.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing required fields; never retried
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness conflict; callers treat this as a silent skip
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Network, timeout, or upstream availability failure; retryable
    #[error("transient error in {context}: {message}")]
    Transient { context: String, message: String },

    /// Semantic rejection by the delivery target; not retryable
    #[error("permanent error in {context}: {message}")]
    Permanent { context: String, message: String },

    /// Backing store refused the operation
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

impl AppError {
    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a duplicate error carrying the conflicting key.
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::Duplicate(key.into())
    }

    /// Create a transient error with context.
    pub fn transient(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transient {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a permanent error with context.
    pub fn permanent(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Permanent {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Whether a failed delivery attempt with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

// HTTP transport failures (connect, timeout, body read) are retryable by
// classification; status-code handling happens at the call sites that can
// see the response.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let context = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "http".to_string());
        Self::Transient {
            context,
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
