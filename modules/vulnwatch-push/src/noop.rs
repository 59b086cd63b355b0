use async_trait::async_trait;
use tracing::debug;

use crate::backend::{RawPusher, TextPusher};
use crate::message::RawMessage;

/// Discarding sink, used when no webhook is configured and in tests.
pub struct NoopPusher;

#[async_trait]
impl TextPusher for NoopPusher {
    async fn push_markdown(&self, title: &str, _body: &str) -> anyhow::Result<()> {
        debug!(title, "NoopPusher: dropping markdown message");
        Ok(())
    }

    async fn push_text(&self, text: &str) -> anyhow::Result<()> {
        debug!(text, "NoopPusher: dropping text message");
        Ok(())
    }
}

#[async_trait]
impl RawPusher for NoopPusher {
    async fn push_raw(&self, _msg: &RawMessage) -> anyhow::Result<()> {
        Ok(())
    }
}
