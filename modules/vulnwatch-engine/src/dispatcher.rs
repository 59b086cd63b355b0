//! Notification dispatch.
//!
//! Records are processed one at a time through an ordered guard chain:
//! valuableness filter → fresh reload → already-pushed → cross-source CVE
//! suppression → mark pushed → reference enrichment → delivery. A failing
//! guard skips the record and never the tick. Records are handled
//! sequentially so the suppression query and the pushed transition cannot
//! race within a tick.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use vulnwatch_common::{Config, VulnRecord};
use vulnwatch_push::{render_vuln, RawMessage, RawPusher, TextPusher};

use crate::refcache::{PullRequestLister, ReferenceCache};
use crate::sources::VulnSource;
use crate::store::VulnStore;

pub struct Dispatcher {
    store: Arc<dyn VulnStore>,
    sources: HashMap<String, Arc<dyn VulnSource>>,
    text: Arc<dyn TextPusher>,
    raw: Arc<dyn RawPusher>,
    github: Arc<dyn PullRequestLister>,
    no_filter: bool,
    enable_cve_filter: bool,
    no_reference_search: bool,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn VulnStore>,
        sources: &[Arc<dyn VulnSource>],
        text: Arc<dyn TextPusher>,
        raw: Arc<dyn RawPusher>,
        github: Arc<dyn PullRequestLister>,
        config: &Config,
    ) -> Self {
        let sources = sources
            .iter()
            .map(|s| (s.provider().name, s.clone()))
            .collect();
        Self {
            store,
            sources,
            text,
            raw,
            github,
            no_filter: config.no_filter,
            enable_cve_filter: config.enable_cve_filter,
            no_reference_search: config.no_reference_search,
        }
    }

    /// Run the guard chain over this tick's notify-worthy records and deliver
    /// the survivors through both sinks.
    pub async fn dispatch(&self, records: Vec<VulnRecord>, refs: &mut ReferenceCache) {
        for mut record in records {
            if !self.no_filter && !self.is_valuable(&record) {
                info!(%record, "Skipped as not valuable");
                continue;
            }

            // Defensive re-read: the catalog may have moved under us.
            let stored = match self.store.find_by_key(&record.unique_key).await {
                Ok(Some(stored)) => stored,
                Ok(None) => {
                    error!(key = record.unique_key.as_str(), "Record missing on reload");
                    continue;
                }
                Err(e) => {
                    error!(key = record.unique_key.as_str(), error = %e, "Failed to reload record");
                    continue;
                }
            };

            if stored.pushed {
                info!(%record, "Already pushed, skipped");
                continue;
            }

            if !record.cve.is_empty() && self.enable_cve_filter {
                match self.store.find_pushed_by_cve(&record.cve).await {
                    Ok(others) if !others.is_empty() => {
                        // Not marked pushed: the record stays eligible for
                        // re-evaluation on later ticks.
                        let keys: Vec<&str> =
                            others.iter().map(|o| o.unique_key.as_str()).collect();
                        info!(
                            cve = record.cve.as_str(),
                            others = ?keys,
                            "Other source already pushed this CVE, skipped"
                        );
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(key = record.unique_key.as_str(), error = %e, "CVE query failed");
                        continue;
                    }
                }
            }

            // Commit the delivery marker before sending. If this fails the
            // record is skipped rather than delivered unrecorded.
            if let Err(e) = self.store.set_pushed(&record.unique_key).await {
                error!(key = record.unique_key.as_str(), error = %e, "Failed to mark pushed");
                continue;
            }

            if !record.cve.is_empty() && !self.no_reference_search {
                if let Err(e) = self.enrich(&mut record, refs).await {
                    error!(key = record.unique_key.as_str(), error = %e, "Failed to save references");
                    continue;
                }
            }

            info!(%record, "Pushing");
            if let Err(e) = self
                .text
                .push_markdown(&record.title, &render_vuln(&record))
                .await
            {
                error!(key = record.unique_key.as_str(), error = %e, "Text pusher failed");
            }
            if let Err(e) = self.raw.push_raw(&RawMessage::vuln(&record)).await {
                error!(key = record.unique_key.as_str(), error = %e, "Raw pusher failed");
            }
        }
    }

    fn is_valuable(&self, record: &VulnRecord) -> bool {
        self.sources
            .get(&record.source)
            .map(|s| s.is_valuable(record))
            .unwrap_or(false)
    }

    /// Merge pull-request links for the record's CVE into its reference set
    /// and persist the merged set. A fetch failure degrades to "no links";
    /// a persistence failure propagates to the caller.
    async fn enrich(&self, record: &mut VulnRecord, refs: &mut ReferenceCache) -> Result<()> {
        let links = match refs.links_for(self.github.as_ref(), &record.cve).await {
            Ok(links) => links,
            Err(e) => {
                warn!(cve = record.cve.as_str(), error = %e, "Reference search failed");
                return Ok(());
            }
        };
        info!(
            cve = record.cve.as_str(),
            count = links.len(),
            "Pull requests matched"
        );
        if links.is_empty() {
            return Ok(());
        }

        let merged = merge_unique(&record.references, &links);
        self.store
            .update_references(&record.unique_key, &merged)
            .await?;
        record.references = merged;
        Ok(())
    }
}

/// Append `extra` onto `existing`, dropping duplicates. Order of first
/// appearance is preserved.
pub fn merge_unique(existing: &[String], extra: &[String]) -> Vec<String> {
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let mut merged = Vec::with_capacity(existing.len() + extra.len());
    for value in existing.iter().chain(extra) {
        if seen.insert(value.as_str()) {
            merged.push(value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_unique_preserves_order_and_drops_duplicates() {
        let existing = vec!["a".to_string(), "b".to_string()];
        let extra = vec!["b".to_string(), "c".to_string(), "a".to_string()];
        assert_eq!(merge_unique(&existing, &extra), vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_unique_with_empty_sides() {
        assert_eq!(merge_unique(&[], &["x".to_string()]), vec!["x"]);
        assert_eq!(merge_unique(&["x".to_string()], &[]), vec!["x"]);
    }
}
