// src/publish/discord.rs

//! Discord webhook target.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::PublisherConfig;
use crate::publish::{format, ChatTarget, NewsMessage};

/// Sends messages to a Discord webhook as embeds.
///
/// Discord answers `204 No Content` on success. Rate limits, server errors
/// and transport failures are retryable; any other 4xx means the payload or
/// the webhook itself is bad and retrying cannot help.
pub struct DiscordWebhook {
    client: reqwest::Client,
    webhook_url: String,
    embed_color: u32,
    footer_text: String,
}

impl DiscordWebhook {
    pub fn new(client: reqwest::Client, config: &PublisherConfig) -> Result<Self> {
        if config.webhook_url.trim().is_empty() {
            return Err(AppError::config(
                "publisher.webhook_url is not set (or DISCORD_WEBHOOK_URL)",
            ));
        }
        Ok(Self {
            client,
            webhook_url: config.webhook_url.clone(),
            embed_color: config.embed_color,
            footer_text: config.footer_text.clone(),
        })
    }

    fn classify_status(status: StatusCode, body: &str) -> AppError {
        let detail = format!("status {}: {}", status.as_u16(), body.trim());
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            AppError::transient("discord webhook", detail)
        } else {
            AppError::permanent("discord webhook", detail)
        }
    }
}

#[async_trait]
impl ChatTarget for DiscordWebhook {
    async fn send(&self, message: &NewsMessage) -> Result<()> {
        let payload = format::embed_payload(message, self.embed_color, &self.footer_text);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(title = %message.title, "webhook message delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        let err = DiscordWebhook::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_retryable());

        let err = DiscordWebhook::classify_status(StatusCode::BAD_GATEWAY, "");
        assert!(err.is_retryable());

        let err = DiscordWebhook::classify_status(StatusCode::NOT_FOUND, "unknown webhook");
        assert!(!err.is_retryable());
        assert!(matches!(err, AppError::Permanent { .. }));

        let err = DiscordWebhook::classify_status(StatusCode::BAD_REQUEST, "invalid embed");
        assert!(matches!(err, AppError::Permanent { .. }));
    }

    #[test]
    fn test_new_requires_webhook_url() {
        let client = reqwest::Client::new();
        let config = PublisherConfig::default();
        assert!(DiscordWebhook::new(client, &config).is_err());

        let client = reqwest::Client::new();
        let config = PublisherConfig {
            webhook_url: "https://discord.com/api/webhooks/1/abc".to_string(),
            ..PublisherConfig::default()
        };
        assert!(DiscordWebhook::new(client, &config).is_ok());
    }
}
