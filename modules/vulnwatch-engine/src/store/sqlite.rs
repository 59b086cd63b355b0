//! SQLite catalog backend.
//!
//! One connection, so every statement observes a globally consistent order:
//! concurrent collector tasks and the sequential dispatcher serialize here
//! rather than in the engine.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use vulnwatch_common::{StoredVuln, VulnRecord, VulnWatchError};

use super::VulnStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vulns (
    unique_key  TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    severity    TEXT NOT NULL,
    cve         TEXT NOT NULL,
    disclosure  TEXT NOT NULL,
    solutions   TEXT NOT NULL,
    refs        TEXT NOT NULL,
    tags        TEXT NOT NULL,
    source      TEXT NOT NULL,
    pushed      INTEGER NOT NULL DEFAULT 0
)
"#;

const COLUMNS: &str =
    "unique_key, title, description, severity, cve, disclosure, solutions, refs, tags, source, pushed";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the catalog database and ensure the schema.
    pub async fn open(path: &str) -> Result<Self, VulnWatchError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
            .map_err(db_err)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(opts)
            .await
            .map_err(db_err)?;

        sqlx::query(SCHEMA).execute(&pool).await.map_err(db_err)?;

        Ok(Self { pool })
    }
}

fn db_err(err: sqlx::Error) -> VulnWatchError {
    VulnWatchError::Database(err.to_string())
}

// ---------------------------------------------------------------------------
// Row mapping: references/tags are JSON-encoded string sets
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct VulnRow {
    unique_key: String,
    title: String,
    description: String,
    severity: String,
    cve: String,
    disclosure: String,
    solutions: String,
    refs: String,
    tags: String,
    source: String,
    pushed: bool,
}

impl VulnRow {
    fn into_stored(self) -> Result<StoredVuln, VulnWatchError> {
        let references = serde_json::from_str(&self.refs)
            .map_err(|e| VulnWatchError::Database(format!("bad refs column: {e}")))?;
        let tags = serde_json::from_str(&self.tags)
            .map_err(|e| VulnWatchError::Database(format!("bad tags column: {e}")))?;
        Ok(StoredVuln {
            unique_key: self.unique_key,
            title: self.title,
            description: self.description,
            severity: self.severity,
            cve: self.cve,
            disclosure: self.disclosure,
            solutions: self.solutions,
            references,
            tags,
            source: self.source,
            pushed: self.pushed,
        })
    }
}

fn encode_set(values: &[String]) -> String {
    serde_json::to_string(values).expect("string vec serialization cannot fail")
}

#[async_trait]
impl VulnStore for SqliteStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<StoredVuln>> {
        let row = sqlx::query_as::<_, VulnRow>(&format!(
            "SELECT {COLUMNS} FROM vulns WHERE unique_key = ?1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(VulnRow::into_stored).transpose()?)
    }

    async fn create(&self, record: &VulnRecord) -> Result<StoredVuln> {
        let row = sqlx::query_as::<_, VulnRow>(&format!(
            r#"
            INSERT INTO vulns ({COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&record.unique_key)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.severity.as_str())
        .bind(&record.cve)
        .bind(&record.disclosure)
        .bind(&record.solutions)
        .bind(encode_set(&record.references))
        .bind(encode_set(&record.tags))
        .bind(&record.source)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into_stored()?)
    }

    async fn update(&self, key: &str, record: &VulnRecord) -> Result<StoredVuln> {
        let row = sqlx::query_as::<_, VulnRow>(&format!(
            r#"
            UPDATE vulns SET
                title = ?2, description = ?3, severity = ?4, cve = ?5,
                disclosure = ?6, solutions = ?7, refs = ?8, tags = ?9, source = ?10
            WHERE unique_key = ?1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(key)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.severity.as_str())
        .bind(&record.cve)
        .bind(&record.disclosure)
        .bind(&record.solutions)
        .bind(encode_set(&record.references))
        .bind(encode_set(&record.tags))
        .bind(&record.source)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into_stored()?)
    }

    async fn set_pushed(&self, key: &str) -> Result<()> {
        let result = sqlx::query("UPDATE vulns SET pushed = 1 WHERE unique_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(VulnWatchError::Database(format!("no row for key {key}")).into());
        }
        Ok(())
    }

    async fn update_references(&self, key: &str, references: &[String]) -> Result<()> {
        sqlx::query("UPDATE vulns SET refs = ?2 WHERE unique_key = ?1")
            .bind(key)
            .bind(encode_set(references))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_pushed_by_cve(&self, cve: &str) -> Result<Vec<StoredVuln>> {
        let rows = sqlx::query_as::<_, VulnRow>(&format!(
            "SELECT {COLUMNS} FROM vulns WHERE cve = ?1 AND pushed = 1"
        ))
        .bind(cve)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|r| Ok(r.into_stored()?))
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM vulns")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.0 as usize)
    }
}
