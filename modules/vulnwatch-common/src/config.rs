use std::env;
use std::time::Duration;

/// Application configuration. Loaded from `VULNWATCH_*` environment variables;
/// the binary's CLI flags may override individual fields afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Polling interval between ticks.
    pub interval: Duration,
    /// Source shortnames to watch. Unknown names fail startup.
    pub sources: Vec<String>,
    /// SQLite database path.
    pub db_path: String,
    /// Push every notify-worthy record, skipping the valuableness filter.
    pub no_filter: bool,
    /// Suppress the initialization summary message.
    pub no_start_message: bool,
    /// Suppress repeat pushes for a CVE another source already delivered.
    pub enable_cve_filter: bool,
    /// Skip the pull-request reference enrichment.
    pub no_reference_search: bool,
    /// Slack incoming webhook for the formatted sink. None → no-op sink.
    pub slack_webhook_url: Option<String>,
    /// Generic webhook for the raw sink. None → no-op sink.
    pub webhook_url: Option<String>,
    pub version: String,
}

impl Config {
    /// Load configuration from environment variables. Only webhook URLs are
    /// required to be absent-able; everything else has a default.
    pub fn from_env() -> Self {
        Self {
            interval: Duration::from_secs(env_u64("VULNWATCH_INTERVAL_MINUTES", 30) * 60),
            sources: env::var("VULNWATCH_SOURCES")
                .unwrap_or_else(|_| "nvd".to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            db_path: env::var("VULNWATCH_DB_PATH").unwrap_or_else(|_| "vulnwatch.sqlite3".to_string()),
            no_filter: env_bool("VULNWATCH_NO_FILTER"),
            no_start_message: env_bool("VULNWATCH_NO_START_MESSAGE"),
            enable_cve_filter: env_bool("VULNWATCH_ENABLE_CVE_FILTER"),
            no_reference_search: env_bool("VULNWATCH_NO_REFERENCE_SEARCH"),
            slack_webhook_url: env::var("VULNWATCH_SLACK_WEBHOOK_URL").ok(),
            webhook_url: env::var("VULNWATCH_WEBHOOK_URL").ok(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn env_bool(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
