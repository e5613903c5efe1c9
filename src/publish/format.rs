// src/publish/format.rs

//! Message formatting for queued articles.

use serde_json::{json, Value};

use crate::models::QueueItem;
use crate::publish::NewsMessage;
use crate::utils::summarize;

/// Longest body excerpt shown in a message.
const CONTENT_CHARS: usize = 200;

/// Build the outbound message for a queue item.
pub fn render(item: &QueueItem) -> NewsMessage {
    let content = item
        .content
        .as_deref()
        .map(|body| summarize(body, CONTENT_CHARS))
        .filter(|summary| !summary.is_empty());

    NewsMessage {
        title: item.title.clone(),
        url: item.url.clone(),
        content,
        image_url: None,
        category: item.category.clone(),
        platform: item.platform.clone(),
    }
}

/// Build the Discord webhook payload for a message.
pub fn embed_payload(message: &NewsMessage, color: u32, footer_text: &str) -> Value {
    let mut embed = json!({
        "title": message.title,
        "url": message.url,
        "color": color,
        "footer": { "text": footer_text },
    });

    if let Some(content) = &message.content {
        embed["description"] = Value::from(content.as_str());
    }
    if let Some(image_url) = &message.image_url {
        embed["image"] = json!({ "url": image_url });
    }

    let mut fields = vec![json!({
        "name": "source",
        "value": message.platform,
        "inline": true,
    })];
    if let Some(category) = &message.category {
        fields.push(json!({
            "name": "category",
            "value": category,
            "inline": true,
        }));
    }
    embed["fields"] = Value::from(fields);

    json!({ "embeds": [embed] })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::QueueStatus;

    fn sample_item() -> QueueItem {
        let now = Utc::now();
        QueueItem {
            unique_id: "YTN_1".to_string(),
            article_id: "1".to_string(),
            platform: "YTN".to_string(),
            title: "Breaking headline".to_string(),
            url: "https://news.example.com/1".to_string(),
            content: Some("word ".repeat(100)),
            category: Some("politics".to_string()),
            status: QueueStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            published_at: None,
        }
    }

    #[test]
    fn test_render_truncates_content() {
        let message = render(&sample_item());
        assert_eq!(message.title, "Breaking headline");
        let content = message.content.unwrap();
        assert!(content.chars().count() <= 203);
        assert!(content.ends_with("..."));
    }

    #[test]
    fn test_render_drops_empty_content() {
        let mut item = sample_item();
        item.content = Some("   ".to_string());
        assert!(render(&item).content.is_none());

        item.content = None;
        assert!(render(&item).content.is_none());
    }

    #[test]
    fn test_embed_payload_shape() {
        let message = render(&sample_item());
        let payload = embed_payload(&message, 0x3498DB, "sokbo news");

        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Breaking headline");
        assert_eq!(embed["url"], "https://news.example.com/1");
        assert_eq!(embed["color"], 0x3498DB);
        assert_eq!(embed["footer"]["text"], "sokbo news");
        assert!(embed["description"].is_string());

        let fields = embed["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["value"], "YTN");
        assert_eq!(fields[1]["value"], "politics");

        // No image when the message carries none
        assert!(embed.get("image").is_none());
    }
}
