//! Per-tick update collection.
//!
//! One task per source; within a source, pages are walked strictly in order
//! so the early-stop heuristic is well-defined. Every record encountered goes
//! through the change detector, which persists the latest data regardless of
//! notify-worthiness.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use futures::future::try_join_all;
use tracing::info;

use vulnwatch_common::VulnRecord;

use crate::detector::ChangeDetector;
use crate::sources::VulnSource;
use crate::store::VulnStore;
use crate::MAX_PAGES;

pub const TICK_PAGE_SIZE: usize = 10;

pub struct UpdateCollector {
    sources: Vec<Arc<dyn VulnSource>>,
    detector: ChangeDetector,
}

impl UpdateCollector {
    pub fn new(sources: Vec<Arc<dyn VulnSource>>, store: Arc<dyn VulnStore>) -> Self {
        Self {
            sources,
            detector: ChangeDetector::new(store),
        }
    }

    /// Collect the notify-worthy records across all sources for one tick.
    /// The first fetch or persistence error cancels the sibling walks and
    /// fails the whole collection.
    pub async fn collect(&self) -> Result<Vec<VulnRecord>> {
        let found = Mutex::new(Vec::new());
        try_join_all(
            self.sources
                .iter()
                .map(|source| self.collect_source(source.as_ref(), &found)),
        )
        .await?;
        Ok(found.into_inner().expect("collector mutex poisoned"))
    }

    async fn collect_source(
        &self,
        source: &dyn VulnSource,
        found: &Mutex<Vec<VulnRecord>>,
    ) -> Result<()> {
        let provider = source.provider();
        let page_count = source
            .page_count(TICK_PAGE_SIZE)
            .await
            .with_context(|| format!("page count of {}", provider.name))?
            .min(MAX_PAGES);

        for page in 1..=page_count {
            let records = source.parse_page(page, TICK_PAGE_SIZE).await?;
            let mut page_has_new = false;

            for mut record in records {
                let notify_worthy = self
                    .detector
                    .reconcile(&mut record)
                    .await
                    .with_context(|| format!("reconciling {}", record.unique_key))?;
                if notify_worthy {
                    info!(
                        source = provider.name.as_str(),
                        key = record.unique_key.as_str(),
                        "Found new vuln"
                    );
                    found.lock().expect("collector mutex poisoned").push(record);
                    page_has_new = true;
                }
            }

            // Feeds are reverse-chronological: a page with nothing new means
            // every later page is unchanged too.
            if !page_has_new {
                break;
            }
        }
        Ok(())
    }
}
