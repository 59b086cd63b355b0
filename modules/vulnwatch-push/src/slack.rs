use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::backend::TextPusher;

/// Slack incoming webhook, used as the formatted sink.
pub struct SlackPusher {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackPusher {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, payload: serde_json::Value) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack webhook returned non-success");
            anyhow::bail!("Slack webhook returned {status}");
        }

        Ok(())
    }
}

#[async_trait]
impl TextPusher for SlackPusher {
    async fn push_markdown(&self, title: &str, body: &str) -> anyhow::Result<()> {
        let payload = json!({
            "text": format!("*{title}*\n\n{body}"),
            "unfurl_links": false,
        });
        self.post(payload).await
    }

    async fn push_text(&self, text: &str) -> anyhow::Result<()> {
        let payload = json!({
            "text": text,
            "unfurl_links": false,
        });
        self.post(payload).await
    }
}
