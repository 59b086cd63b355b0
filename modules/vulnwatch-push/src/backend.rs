use async_trait::async_trait;

use crate::message::RawMessage;

/// Formatted delivery channel. Receives rendered markdown.
#[async_trait]
pub trait TextPusher: Send + Sync {
    async fn push_markdown(&self, title: &str, body: &str) -> anyhow::Result<()>;

    async fn push_text(&self, text: &str) -> anyhow::Result<()>;
}

/// Structured delivery channel. Receives the raw message payload verbatim.
#[async_trait]
pub trait RawPusher: Send + Sync {
    async fn push_raw(&self, msg: &RawMessage) -> anyhow::Result<()>;
}
