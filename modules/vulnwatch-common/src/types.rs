use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity category of a vulnerability. Ordered low → critical.
///
/// Change detection compares the string form, so the catalog can hold
/// severities this enum does not know about without misclassifying them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity descriptor for one vulnerability source. Not persisted; used in
/// log lines and the initialization summary only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Short name, also stored on every record as its `source` field.
    pub name: String,
    /// Human-readable name for messages.
    pub display_name: String,
    /// Home page of the feed.
    pub link: String,
}

/// One vulnerability as parsed from a source, before reconciliation.
///
/// `reasons` accumulates change annotations during a single detection pass
/// (created, severity escalated, tag added). It is message material for the
/// current tick, not persisted history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnRecord {
    /// Stable identity across polls and sources. Sole join key.
    pub unique_key: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Cross-source correlation id. Empty string means none.
    pub cve: String,
    /// Date of public disclosure.
    pub disclosure: String,
    pub solutions: String,
    pub references: Vec<String>,
    pub tags: Vec<String>,
    /// Shortname of the originating source.
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl fmt::Display for VulnRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.unique_key)
    }
}

/// One catalog row. Everything from `VulnRecord` flattened to persisted form,
/// plus the monotonic `pushed` delivery marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVuln {
    pub unique_key: String,
    pub title: String,
    pub description: String,
    /// Stored as an opaque string; compared as such by the change detector.
    pub severity: String,
    pub cve: String,
    pub disclosure: String,
    pub solutions: String,
    pub references: Vec<String>,
    pub tags: Vec<String>,
    pub source: String,
    /// False → true exactly once, in the dispatcher. Never reset.
    pub pushed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_string_forms() {
        assert_eq!(Severity::Low.as_str(), "low");
        assert_eq!(Severity::Critical.to_string(), "critical");
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
