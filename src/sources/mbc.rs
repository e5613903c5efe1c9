// src/sources/mbc.rs

//! MBC news adapter.
//!
//! MBC has no stable list API, so the politics section page is scraped
//! with CSS selectors. Links carry no article id; identity falls back to
//! the URL hash.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{Article, ArticleMetadata};
use crate::sources::NewsSource;
use crate::utils::{collapse_whitespace, strip_bom};

const BASE_URL: &str = "https://imnews.imbc.com";

const ROW_SELECTOR: &str = ".list_area li a";
const TITLE_SELECTOR: &str = ".tit";

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Extract articles from the section list page.
fn parse_list(html: &str, base_url: &url::Url) -> Result<Vec<Article>> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector(ROW_SELECTOR)?;
    let title_sel = parse_selector(TITLE_SELECTOR)?;

    let mut articles = Vec::new();
    for row in document.select(&row_sel) {
        let Some(raw_link) = row.value().attr("href") else {
            continue;
        };
        let Ok(link) = base_url.join(raw_link) else {
            continue;
        };

        let title = row
            .select(&title_sel)
            .next()
            .map(|elem| collapse_whitespace(&elem.text().collect::<String>()))
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let mut metadata = ArticleMetadata::new("MBC");
        metadata.category = Some("politics".to_string());
        articles.push(Article::new(title, link.to_string(), metadata));
    }
    Ok(articles)
}

pub struct MbcSource {
    client: reqwest::Client,
}

impl MbcSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn section_url() -> String {
        // The section path is year-scoped
        format!("{}/news/{}/politics/", BASE_URL, Utc::now().year())
    }
}

#[async_trait]
impl NewsSource for MbcSource {
    fn tag(&self) -> &str {
        "MBC"
    }

    async fn fetch(&self) -> Result<Vec<Article>> {
        let section_url = Self::section_url();
        let html = self
            .client
            .get(&section_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let base_url = url::Url::parse(BASE_URL)?;
        let articles = parse_list(strip_bom(&html), &base_url)?;
        debug!(count = articles.len(), "mbc section parsed");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <div class="list_area">
            <ul>
                <li>
                    <a href="/article/2024/politics/6601234_36431.html">
                        <span class="tit">국회  본회의   통과</span>
                    </a>
                </li>
                <li>
                    <a href="https://imnews.imbc.com/article/6601235.html">
                        <span class="tit">두 번째 기사</span>
                    </a>
                </li>
                <li><a href="/no-title.html"><span class="etc">x</span></a></li>
                <li><span class="tit">링크 없음</span></li>
            </ul>
        </div>
    "#;

    #[test]
    fn test_parse_list_resolves_links_and_cleans_titles() {
        let base = url::Url::parse(BASE_URL).unwrap();
        let articles = parse_list(SAMPLE, &base).unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "국회 본회의 통과");
        assert_eq!(
            articles[0].url,
            "https://imnews.imbc.com/article/2024/politics/6601234_36431.html"
        );
        assert_eq!(articles[1].url, "https://imnews.imbc.com/article/6601235.html");

        // No source id: identity is the URL hash
        assert!(articles[0].unique_id.starts_with("MBC_"));
        assert_ne!(articles[0].unique_id, articles[1].unique_id);
    }

    #[test]
    fn test_parse_list_empty_document() {
        let base = url::Url::parse(BASE_URL).unwrap();
        assert!(parse_list("<html></html>", &base).unwrap().is_empty());
    }
}
