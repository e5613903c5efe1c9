// src/sources/ytn.rs

//! YTN breaking-news adapter.
//!
//! YTN exposes its politics list as a paged form-POST endpoint that
//! returns JSON rows. Only rows dated today are kept so a crawl cycle
//! never re-collects the long tail.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Article, ArticleMetadata, CrawlerConfig};
use crate::sources::NewsSource;
use crate::utils::{collapse_whitespace, read_json};

const API_URL: &str = "https://www.ytn.co.kr/ajax/getMoreNews.php";
const LIST_REFERER: &str = "https://www.ytn.co.kr/news/list.php?mcd=0101";

/// Section code for politics.
const SECTION_MCD: &str = "0101";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Option<ListPage>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    data: Vec<ListRow>,
}

#[derive(Debug, Deserialize)]
struct ListRow {
    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    join_key: Option<String>,

    /// The list endpoint keys the display date by column index.
    #[serde(default, rename = "3")]
    date: Option<String>,
}

pub struct YtnSource {
    client: reqwest::Client,
    pages: u32,
    request_delay: Duration,
}

impl YtnSource {
    pub fn new(client: reqwest::Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            pages: config.ytn_pages.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<ListResponse> {
        let page = page.to_string();
        let response = self
            .client
            .post(API_URL)
            .header(reqwest::header::REFERER, LIST_REFERER)
            .form(&[("mcd", SECTION_MCD), ("page", page.as_str())])
            .send()
            .await?
            .error_for_status()?;
        read_json(response).await
    }
}

/// Convert one page of list rows into articles, keeping only `today` rows.
fn parse_page(response: ListResponse, today: &str) -> Vec<Article> {
    let Some(page) = response.data else {
        return Vec::new();
    };

    page.data
        .into_iter()
        .filter_map(|row| {
            let title = row.title.map(|t| collapse_whitespace(&t))?;
            let join_key = row.join_key?;
            if title.is_empty() || row.date.as_deref() != Some(today) {
                return None;
            }

            let url = format!("https://www.ytn.co.kr/_ln/{SECTION_MCD}_{join_key}");
            let mut metadata = ArticleMetadata::new("YTN");
            metadata.category = Some("politics".to_string());
            metadata.article_id = Some(join_key.clone());
            metadata
                .platform_specific
                .insert("mcd".to_string(), Value::from(SECTION_MCD));
            metadata
                .platform_specific
                .insert("join_key".to_string(), Value::from(join_key));

            Some(Article::new(title, url, metadata))
        })
        .collect()
}

#[async_trait]
impl NewsSource for YtnSource {
    fn tag(&self) -> &str {
        "YTN"
    }

    async fn fetch(&self) -> Result<Vec<Article>> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut articles = Vec::new();

        for page in 1..=self.pages {
            match self.fetch_page(page).await {
                Ok(response) => {
                    let page_articles = parse_page(response, &today);
                    debug!(page, count = page_articles.len(), "ytn page parsed");
                    articles.extend(page_articles);
                }
                // One broken page should not cost the rest of the cycle
                Err(err) => warn!(page, error = %err, "ytn page fetch failed"),
            }

            if self.request_delay > Duration::ZERO {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        Ok(articles)
    }
}
