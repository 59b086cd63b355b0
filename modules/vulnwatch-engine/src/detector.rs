//! Per-record change detection.
//!
//! The single place catalog rows are written for freshness. Every incoming
//! record is persisted in full whether or not it warrants a notification;
//! the `pushed` flag is the dispatcher's to set, never touched here.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use vulnwatch_common::VulnRecord;

use crate::store::VulnStore;

pub const REASON_NEW_CREATED: &str = "new vuln created";
pub const REASON_SEVERITY_CHANGED: &str = "severity changed";
pub const REASON_TAGS_CHANGED: &str = "tags changed";

pub struct ChangeDetector {
    store: Arc<dyn VulnStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn VulnStore>) -> Self {
        Self { store }
    }

    /// Reconcile one incoming record against the catalog.
    ///
    /// Returns true if the record is notify-worthy: newly created, severity
    /// string changed, or a tag appeared that the stored row lacks. Change
    /// annotations are appended to `record.reasons`.
    pub async fn reconcile(&self, record: &mut VulnRecord) -> Result<bool> {
        let Some(existing) = self.store.find_by_key(&record.unique_key).await? else {
            record.reasons.push(REASON_NEW_CREATED.to_string());
            let created = self.store.create(record).await?;
            debug!(
                key = created.unique_key.as_str(),
                source = record.source.as_str(),
                "Vuln created"
            );
            return Ok(true);
        };

        let mut notify_worthy = false;

        if record.severity.as_str() != existing.severity {
            info!(
                title = record.title.as_str(),
                source = record.source.as_str(),
                old = existing.severity.as_str(),
                new = record.severity.as_str(),
                "Severity changed"
            );
            record.reasons.push(format!(
                "{REASON_SEVERITY_CHANGED}: {} => {}",
                existing.severity, record.severity
            ));
            notify_worthy = true;
        }

        for tag in &record.tags {
            if !existing.tags.contains(tag) {
                info!(
                    title = record.title.as_str(),
                    source = record.source.as_str(),
                    tag = tag.as_str(),
                    "New tag"
                );
                record.reasons.push(format!(
                    "{REASON_TAGS_CHANGED}: [{}] => [{}]",
                    existing.tags.join(", "),
                    record.tags.join(", ")
                ));
                notify_worthy = true;
                break;
            }
        }

        // The catalog always tracks the latest crawl, notify-worthy or not.
        let updated = self.store.update(&record.unique_key, record).await?;
        debug!(
            key = updated.unique_key.as_str(),
            source = record.source.as_str(),
            "Vuln updated"
        );
        Ok(notify_worthy)
    }
}
