// Source capability boundary.
//
// Every feed adapter implements VulnSource. The engine only sees this trait:
// page-count discovery, paginated retrieval, the per-record valuableness
// predicate, and a static identity descriptor. Scraping internals stay in
// the adapters.

pub mod nvd;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use vulnwatch_common::{Provider, VulnRecord, VulnWatchError};

#[async_trait]
pub trait VulnSource: Send + Sync {
    /// Static identity of this feed.
    fn provider(&self) -> Provider;

    /// Total pages the feed reports at the given page size.
    async fn page_count(&self, page_size: usize) -> Result<usize>;

    /// Fetch and parse one page. Pages start at 1, newest records first.
    async fn parse_page(&self, page: usize, page_size: usize) -> Result<Vec<VulnRecord>>;

    /// Whether a record is significant enough to notify about.
    fn is_valuable(&self, record: &VulnRecord) -> bool;
}

/// Resolve configured source names to adapters. Unknown names are fatal.
pub fn build_sources(names: &[String]) -> Result<Vec<Arc<dyn VulnSource>>, VulnWatchError> {
    let mut sources: Vec<Arc<dyn VulnSource>> = Vec::with_capacity(names.len());
    for name in names {
        match name.trim().to_lowercase().as_str() {
            "nvd" => sources.push(Arc::new(nvd::NvdSource::new())),
            other => {
                return Err(VulnWatchError::Config(format!(
                    "unknown vuln source: {other}"
                )))
            }
        }
    }
    Ok(sources)
}
