// Catalog store boundary.
//
// The engine assumes a consistent keyed table with single-writer semantics.
// All catalog access goes through this trait; SqliteStore is the production
// backend, MemoryStore (testing) the in-memory one.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use vulnwatch_common::{StoredVuln, VulnRecord};

pub use sqlite::SqliteStore;

#[async_trait]
pub trait VulnStore: Send + Sync {
    /// Point lookup by unique key.
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredVuln>>;

    /// Insert a new row with `pushed = false`.
    async fn create(&self, record: &VulnRecord) -> Result<StoredVuln>;

    /// Overwrite every field except `pushed` with the incoming data.
    async fn update(&self, key: &str, record: &VulnRecord) -> Result<StoredVuln>;

    /// Commit the delivery marker. `pushed` only ever goes false → true.
    async fn set_pushed(&self, key: &str) -> Result<()>;

    /// Replace the reference set after enrichment.
    async fn update_references(&self, key: &str, references: &[String]) -> Result<()>;

    /// All rows sharing a CVE that some source already delivered.
    async fn find_pushed_by_cve(&self, cve: &str) -> Result<Vec<StoredVuln>>;

    async fn count(&self) -> Result<usize>;
}
