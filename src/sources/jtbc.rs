// src/sources/jtbc.rs

//! JTBC news adapter.
//!
//! JTBC serves a JSON section-list API. One request is made per configured
//! section code; the response carries full body text, so the article
//! content is summarized at collection time.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Article, ArticleMetadata, CrawlerConfig};
use crate::sources::NewsSource;
use crate::utils::{collapse_whitespace, read_json, summarize};

const API_URL: &str = "https://news-api.jtbc.co.kr/v1/get/contents/section/list/articles";
const PAGE_SIZE: u32 = 10;
const SUMMARY_CHARS: usize = 200;

/// Section code to category label.
fn category_name(section: u32) -> String {
    match section {
        10 => "politics".to_string(),
        20 => "economy".to_string(),
        30 => "society".to_string(),
        40 => "world".to_string(),
        50 => "culture".to_string(),
        60 => "entertainment".to_string(),
        70 => "sports".to_string(),
        80 => "weather".to_string(),
        other => format!("section-{other}"),
    }
}

#[derive(Debug, Deserialize)]
struct SectionResponse {
    #[serde(default)]
    data: Option<SectionData>,
}

#[derive(Debug, Deserialize)]
struct SectionData {
    #[serde(default)]
    list: Vec<SectionRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionRow {
    #[serde(default)]
    article_idx: Option<String>,

    #[serde(default)]
    article_title: Option<String>,

    #[serde(default)]
    article_inner_text_content: Option<String>,

    #[serde(default)]
    publication_date: Option<String>,

    #[serde(default)]
    journalist_name: Option<String>,

    #[serde(default)]
    is_video_view: bool,

    #[serde(default)]
    vod_info: Option<VodInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VodInfo {
    #[serde(default)]
    video_idx: Option<String>,
}

fn parse_publication_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_section(response: SectionResponse, section: u32) -> Vec<Article> {
    let Some(data) = response.data else {
        return Vec::new();
    };
    let category = category_name(section);

    data.list
        .into_iter()
        .filter_map(|row| {
            let article_idx = row.article_idx?;
            let title = collapse_whitespace(&row.article_title?);
            if title.is_empty() {
                return None;
            }

            let url = format!("https://news.jtbc.co.kr/article/{article_idx}");

            let mut metadata = ArticleMetadata::new("JTBC");
            metadata.category = Some(category.clone());
            metadata.article_id = Some(article_idx.clone());
            metadata.published_at = row
                .publication_date
                .as_deref()
                .and_then(parse_publication_date);
            metadata
                .platform_specific
                .insert("section".to_string(), Value::from(section));

            let video_id = row.vod_info.and_then(|vod| vod.video_idx);
            if row.is_video_view || video_id.is_some() {
                metadata
                    .platform_specific
                    .insert("has_video".to_string(), Value::from(true));
            }
            if let Some(video_id) = video_id {
                metadata
                    .platform_specific
                    .insert("video_id".to_string(), Value::from(video_id));
            }

            let mut article = Article::new(title, url, metadata);
            if let Some(body) = row.article_inner_text_content.as_deref() {
                let summary = summarize(body, SUMMARY_CHARS);
                if !summary.is_empty() {
                    article = article.with_content(summary);
                }
            }
            if let Some(author) = row.journalist_name.map(|j| collapse_whitespace(&j)) {
                if !author.is_empty() {
                    article = article.with_author(author);
                }
            }
            Some(article)
        })
        .collect()
}

pub struct JtbcSource {
    client: reqwest::Client,
    sections: Vec<u32>,
    request_delay: Duration,
}

impl JtbcSource {
    pub fn new(client: reqwest::Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            sections: config.jtbc_sections.clone(),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    async fn fetch_section(&self, section: u32) -> Result<SectionResponse> {
        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("pageNo", "1".to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
                ("articleListType", "ARTICLE".to_string()),
                ("sectionIdx", section.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        read_json(response).await
    }
}

#[async_trait]
impl NewsSource for JtbcSource {
    fn tag(&self) -> &str {
        "JTBC"
    }

    async fn fetch(&self) -> Result<Vec<Article>> {
        let mut articles = Vec::new();

        for &section in &self.sections {
            match self.fetch_section(section).await {
                Ok(response) => {
                    let section_articles = parse_section(response, section);
                    debug!(section, count = section_articles.len(), "jtbc section parsed");
                    articles.extend(section_articles);
                }
                Err(err) => warn!(section, error = %err, "jtbc section fetch failed"),
            }

            if self.request_delay > Duration::ZERO {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        Ok(articles)
    }
}
