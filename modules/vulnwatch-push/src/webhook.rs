use async_trait::async_trait;
use tracing::warn;

use crate::backend::RawPusher;
use crate::message::RawMessage;

/// Generic JSON webhook, used as the raw sink. Posts the `RawMessage`
/// payload verbatim; the receiver owns all formatting.
pub struct WebhookPusher {
    url: String,
    http: reqwest::Client,
}

impl WebhookPusher {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RawPusher for WebhookPusher {
    async fn push_raw(&self, msg: &RawMessage) -> anyhow::Result<()> {
        let resp = self.http.post(&self.url).json(msg).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Webhook returned non-success");
            anyhow::bail!("webhook returned {status}");
        }

        Ok(())
    }
}
