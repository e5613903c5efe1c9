// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::CrawlerConfig;
use crate::utils::text::strip_bom;

/// Create a configured asynchronous HTTP client.
///
/// Every outbound request inherits the configured timeout, so no network
/// call can hang a crawl or publish cycle indefinitely.
pub fn create_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Read a response body as JSON, tolerating a BOM-prefixed payload.
///
/// Some upstream list endpoints serve JSON out of `.js` files that start
/// with a byte order mark, which strict JSON parsing rejects.
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(strip_bom(&body))?)
}
