use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use github_client::GithubClient;
use vulnwatch_common::Config;
use vulnwatch_engine::sources::build_sources;
use vulnwatch_engine::store::SqliteStore;
use vulnwatch_engine::watcher::Watcher;
use vulnwatch_push::{NoopPusher, RawPusher, SlackPusher, TextPusher, WebhookPusher};

/// Watch vulnerability feeds and push new or escalated disclosures.
#[derive(Parser, Debug)]
#[command(name = "vulnwatch", version)]
struct Args {
    /// Comma-separated source names (overrides VULNWATCH_SOURCES).
    #[arg(long)]
    sources: Option<String>,

    /// Polling interval in minutes (overrides VULNWATCH_INTERVAL_MINUTES).
    #[arg(long)]
    interval_minutes: Option<u64>,

    /// SQLite database path (overrides VULNWATCH_DB_PATH).
    #[arg(long)]
    db_path: Option<String>,

    /// Push every notify-worthy record, skipping the valuableness filter.
    #[arg(long)]
    no_filter: bool,

    /// Suppress the initialization summary message.
    #[arg(long)]
    no_start_message: bool,

    /// Suppress repeat pushes for a CVE another source already delivered.
    #[arg(long)]
    enable_cve_filter: bool,

    /// Skip the pull-request reference enrichment.
    #[arg(long)]
    no_reference_search: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    apply_overrides(&mut config, &args);

    info!(version = config.version.as_str(), "vulnwatch starting");

    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    let sources = build_sources(&config.sources)?;

    let text: Arc<dyn TextPusher> = match &config.slack_webhook_url {
        Some(url) => Arc::new(SlackPusher::new(url.clone())),
        None => {
            warn!("No Slack webhook configured, formatted pushes disabled");
            Arc::new(NoopPusher)
        }
    };
    let raw: Arc<dyn RawPusher> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookPusher::new(url.clone())),
        None => {
            warn!("No raw webhook configured, structured pushes disabled");
            Arc::new(NoopPusher)
        }
    };

    let github = Arc::new(GithubClient::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let watcher = Watcher::new(config, store, sources, text, raw, github);
    if let Err(e) = watcher.run(shutdown_rx).await {
        error!(error = %e, "vulnwatch exited");
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(sources) = &args.sources {
        config.sources = sources
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(minutes) = args.interval_minutes {
        config.interval = Duration::from_secs(minutes * 60);
    }
    if let Some(db_path) = &args.db_path {
        config.db_path = db_path.clone();
    }
    config.no_filter |= args.no_filter;
    config.no_start_message |= args.no_start_message;
    config.enable_cve_filter |= args.enable_cve_filter;
    config.no_reference_search |= args.no_reference_search;
}
