// Test mocks for the watch pipeline.
//
// Four mocks matching the four trait boundaries:
// - MemoryStore (VulnStore): stateful in-memory catalog
// - MockSource (VulnSource): fixed pages, records every fetch
// - RecordingPusher (TextPusher + RawPusher): captures every send
// - MockPrLister (PullRequestLister): fixed pull requests, counts calls
//
// Plus helpers for constructing records and configs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use github_client::PullRequest;
use vulnwatch_common::{Config, Provider, Severity, StoredVuln, VulnRecord};
use vulnwatch_push::{RawMessage, RawPusher, TextPusher};

use crate::refcache::PullRequestLister;
use crate::sources::VulnSource;
use crate::store::VulnStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn make_record(key: &str, severity: Severity, tags: &[&str]) -> VulnRecord {
    VulnRecord {
        unique_key: key.to_string(),
        title: format!("vuln {key}"),
        description: format!("description of {key}"),
        severity,
        cve: String::new(),
        disclosure: "2099-01-01".to_string(),
        solutions: String::new(),
        references: Vec::new(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        source: "mock".to_string(),
        reasons: Vec::new(),
    }
}

/// Config with every flag off and a short interval.
pub fn test_config() -> Config {
    Config {
        interval: Duration::from_secs(60),
        sources: vec!["mock".to_string()],
        db_path: ":memory:".to_string(),
        no_filter: false,
        no_start_message: false,
        enable_cve_filter: false,
        no_reference_search: false,
        slack_webhook_url: None,
        webhook_url: None,
        version: "test".to_string(),
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory catalog. Thread-safe; `fail_set_pushed` injects a persistence
/// failure into the mark-pushed guard.
pub struct MemoryStore {
    rows: Mutex<HashMap<String, StoredVuln>>,
    fail_set_pushed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fail_set_pushed: AtomicBool::new(false),
        }
    }

    pub fn fail_set_pushed(&self, fail: bool) {
        self.fail_set_pushed.store(fail, Ordering::SeqCst);
    }

    /// Snapshot one row (for assertions).
    pub fn stored(&self, key: &str) -> Option<StoredVuln> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_stored(record: &VulnRecord, pushed: bool) -> StoredVuln {
    StoredVuln {
        unique_key: record.unique_key.clone(),
        title: record.title.clone(),
        description: record.description.clone(),
        severity: record.severity.as_str().to_string(),
        cve: record.cve.clone(),
        disclosure: record.disclosure.clone(),
        solutions: record.solutions.clone(),
        references: record.references.clone(),
        tags: record.tags.clone(),
        source: record.source.clone(),
        pushed,
    }
}

#[async_trait]
impl VulnStore for MemoryStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredVuln>> {
        Ok(self.rows.lock().unwrap().get(key).cloned())
    }

    async fn create(&self, record: &VulnRecord) -> Result<StoredVuln> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&record.unique_key) {
            bail!("MemoryStore: duplicate key {}", record.unique_key);
        }
        let stored = to_stored(record, false);
        rows.insert(record.unique_key.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, key: &str, record: &VulnRecord) -> Result<StoredVuln> {
        let mut rows = self.rows.lock().unwrap();
        let existing = rows
            .get(key)
            .ok_or_else(|| anyhow!("MemoryStore: no row for key {key}"))?;
        let stored = to_stored(record, existing.pushed);
        rows.insert(key.to_string(), stored.clone());
        Ok(stored)
    }

    async fn set_pushed(&self, key: &str) -> Result<()> {
        if self.fail_set_pushed.load(Ordering::SeqCst) {
            bail!("MemoryStore: injected set_pushed failure");
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(key)
            .ok_or_else(|| anyhow!("MemoryStore: no row for key {key}"))?;
        row.pushed = true;
        Ok(())
    }

    async fn update_references(&self, key: &str, references: &[String]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(key)
            .ok_or_else(|| anyhow!("MemoryStore: no row for key {key}"))?;
        row.references = references.to_vec();
        Ok(())
    }

    async fn find_pushed_by_cve(&self, cve: &str) -> Result<Vec<StoredVuln>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.cve == cve && r.pushed)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.len())
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

type ValuablePredicate = Box<dyn Fn(&VulnRecord) -> bool + Send + Sync>;

/// Fixed-page source. Builder pattern: `.with_pages()`, `.reporting_pages()`,
/// `.valuable_when()`, `.failing_page_count()`. Every `parse_page` call is
/// recorded for early-stop assertions.
pub struct MockSource {
    name: String,
    pages: Vec<Vec<VulnRecord>>,
    reported_pages: Option<usize>,
    valuable: ValuablePredicate,
    fail_page_count: bool,
    fetched_pages: Mutex<Vec<usize>>,
}

impl MockSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pages: Vec::new(),
            reported_pages: None,
            valuable: Box::new(|_| true),
            fail_page_count: false,
            fetched_pages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pages(mut self, pages: Vec<Vec<VulnRecord>>) -> Self {
        self.pages = pages;
        self
    }

    /// Override the reported page count (defaults to the number of pages).
    pub fn reporting_pages(mut self, count: usize) -> Self {
        self.reported_pages = Some(count);
        self
    }

    pub fn valuable_when(
        mut self,
        predicate: impl Fn(&VulnRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.valuable = Box::new(predicate);
        self
    }

    pub fn failing_page_count(mut self) -> Self {
        self.fail_page_count = true;
        self
    }

    /// Pages fetched so far, in order.
    pub fn fetched_pages(&self) -> Vec<usize> {
        self.fetched_pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl VulnSource for MockSource {
    fn provider(&self) -> Provider {
        Provider {
            name: self.name.clone(),
            display_name: format!("{} (mock)", self.name),
            link: format!("https://{}.example.com", self.name),
        }
    }

    async fn page_count(&self, _page_size: usize) -> Result<usize> {
        if self.fail_page_count {
            bail!("MockSource: injected page_count failure");
        }
        Ok(self.reported_pages.unwrap_or(self.pages.len()))
    }

    async fn parse_page(&self, page: usize, _page_size: usize) -> Result<Vec<VulnRecord>> {
        self.fetched_pages.lock().unwrap().push(page);
        Ok(self.pages.get(page - 1).cloned().unwrap_or_default())
    }

    fn is_valuable(&self, record: &VulnRecord) -> bool {
        (self.valuable)(record)
    }
}

// ---------------------------------------------------------------------------
// RecordingPusher
// ---------------------------------------------------------------------------

/// Captures every send on both channels.
pub struct RecordingPusher {
    markdown: Mutex<Vec<(String, String)>>,
    texts: Mutex<Vec<String>>,
    raw: Mutex<Vec<serde_json::Value>>,
}

impl RecordingPusher {
    pub fn new() -> Self {
        Self {
            markdown: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
            raw: Mutex::new(Vec::new()),
        }
    }

    pub fn markdown_sent(&self) -> Vec<(String, String)> {
        self.markdown.lock().unwrap().clone()
    }

    pub fn texts_sent(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn raw_sent(&self) -> Vec<serde_json::Value> {
        self.raw.lock().unwrap().clone()
    }

    /// Total sends across both channels.
    pub fn total_sends(&self) -> usize {
        self.markdown.lock().unwrap().len()
            + self.texts.lock().unwrap().len()
            + self.raw.lock().unwrap().len()
    }
}

impl Default for RecordingPusher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextPusher for RecordingPusher {
    async fn push_markdown(&self, title: &str, body: &str) -> Result<()> {
        self.markdown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }

    async fn push_text(&self, text: &str) -> Result<()> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[async_trait]
impl RawPusher for RecordingPusher {
    async fn push_raw(&self, msg: &RawMessage) -> Result<()> {
        self.raw.lock().unwrap().push(serde_json::to_value(msg)?);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockPrLister
// ---------------------------------------------------------------------------

/// Fixed pull-request listing. Counts calls so tests can assert cache
/// population behavior.
pub struct MockPrLister {
    prs: Vec<PullRequest>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockPrLister {
    pub fn new(prs: Vec<PullRequest>) -> Self {
        Self {
            prs,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            prs: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullRequestLister for MockPrLister {
    async fn list_pull_requests(
        &self,
        _owner: &str,
        _repo: &str,
        _state: &str,
        _page: usize,
        _per_page: usize,
    ) -> Result<Vec<PullRequest>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("MockPrLister: injected failure");
        }
        Ok(self.prs.clone())
    }
}
