//! Catalog seeding.
//!
//! Runs once before polling starts: a bounded window of each source's history
//! is upserted through the change detector, and the detector's notify flag is
//! discarded. Creation leaves `pushed = false` and the dispatcher is never
//! invoked here, so a first run produces zero notifications.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use tracing::info;

use vulnwatch_common::VulnWatchError;

use crate::detector::ChangeDetector;
use crate::sources::VulnSource;
use crate::store::VulnStore;
use crate::MAX_PAGES;

pub const BOOTSTRAP_PAGE_SIZE: usize = 100;

/// Seed the catalog from every configured source. One task per source, pages
/// within a source fetched concurrently; the first error cancels the rest and
/// fails startup.
pub async fn seed_catalog(
    sources: &[Arc<dyn VulnSource>],
    store: Arc<dyn VulnStore>,
) -> Result<()> {
    let detector = ChangeDetector::new(store);
    try_join_all(
        sources
            .iter()
            .map(|source| seed_source(source.as_ref(), &detector)),
    )
    .await?;
    Ok(())
}

async fn seed_source(source: &dyn VulnSource, detector: &ChangeDetector) -> Result<()> {
    let provider = source.provider();
    let total = source
        .page_count(BOOTSTRAP_PAGE_SIZE)
        .await
        .with_context(|| format!("page count of {}", provider.name))?;

    if total == 0 {
        return Err(
            VulnWatchError::Config(format!("{} reported zero pages", provider.name)).into(),
        );
    }

    let total = total.min(MAX_PAGES);
    info!(
        source = provider.name.as_str(),
        pages = total,
        "Seeding catalog"
    );

    try_join_all((1..=total).map(|page| seed_page(source, detector, page))).await?;

    info!(source = provider.name.as_str(), "Seeding complete");
    Ok(())
}

async fn seed_page(source: &dyn VulnSource, detector: &ChangeDetector, page: usize) -> Result<()> {
    let records = source.parse_page(page, BOOTSTRAP_PAGE_SIZE).await?;
    for mut record in records {
        detector
            .reconcile(&mut record)
            .await
            .with_context(|| format!("seeding {}", record.unique_key))?;
    }
    Ok(())
}
