//! The polling scheduler and app assembly.
//!
//! One control loop: bootstrap once, then tick on a fixed interval. A tick
//! runs collection and dispatch to completion before the next fire is
//! awaited; ticks never overlap. Collection errors are logged and retried
//! wholesale on the next tick. The loop exits only on the external shutdown
//! signal, after which both sinks get a best-effort exit notice.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, Timelike};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use vulnwatch_common::{Config, Provider};
use vulnwatch_push::{render_initial, InitialMessage, RawMessage, RawPusher, TextPusher};

use crate::bootstrap;
use crate::collector::UpdateCollector;
use crate::dispatcher::Dispatcher;
use crate::refcache::{PullRequestLister, ReferenceCache};
use crate::sources::VulnSource;
use crate::store::VulnStore;

const QUIET_HOURS_START: u32 = 0;
const QUIET_HOURS_END: u32 = 7;

/// Delay after the exit notice so in-flight webhook sends can drain.
const EXIT_GRACE: Duration = Duration::from_secs(1);

pub struct Watcher {
    config: Config,
    store: Arc<dyn VulnStore>,
    sources: Vec<Arc<dyn VulnSource>>,
    text: Arc<dyn TextPusher>,
    raw: Arc<dyn RawPusher>,
    collector: UpdateCollector,
    dispatcher: Dispatcher,
}

impl Watcher {
    pub fn new(
        config: Config,
        store: Arc<dyn VulnStore>,
        sources: Vec<Arc<dyn VulnSource>>,
        text: Arc<dyn TextPusher>,
        raw: Arc<dyn RawPusher>,
        github: Arc<dyn PullRequestLister>,
    ) -> Self {
        let collector = UpdateCollector::new(sources.clone(), store.clone());
        let dispatcher = Dispatcher::new(
            store.clone(),
            &sources,
            text.clone(),
            raw.clone(),
            github,
            &config,
        );
        Self {
            config,
            store,
            sources,
            text,
            raw,
            collector,
            dispatcher,
        }
    }

    /// Bootstrap, announce, then poll until the shutdown signal fires.
    /// Always returns an error: the cancellation, or a fatal startup failure.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Initializing local catalog");
        bootstrap::seed_catalog(&self.sources, self.store.clone())
            .await
            .context("init data")?;

        let count = self.store.count().await?;
        info!(count, "Catalog initialized");

        if !self.config.no_start_message {
            self.send_start_message(count).await?;
        }

        info!(interval = %format_interval(self.config.interval), "Ticking");
        let result = self.run_loop(&mut shutdown).await;

        self.send_exit_notice().await;
        tokio::time::sleep(EXIT_GRACE).await;
        result
    }

    async fn run_loop(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() yields immediately; the first real fire is one interval out.
        ticker.tick().await;

        loop {
            let next = Local::now() + chrono::Duration::seconds(self.config.interval.as_secs() as i64);
            info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "Next check scheduled");

            tokio::select! {
                _ = shutdown.changed() => {
                    return Err(anyhow!("shutdown signal received"));
                }
                _ = ticker.tick() => {
                    let hour = Local::now().hour();
                    if in_quiet_hours(hour) {
                        info!(hour, "Quiet hours, sleeping");
                        continue;
                    }
                    self.tick().await;
                }
            }
        }
    }

    /// One full tick: collect, then dispatch. All sends complete before this
    /// returns.
    async fn tick(&self) {
        let mut refs = ReferenceCache::new();

        let records = match self.collector.collect().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to collect updates");
                Vec::new()
            }
        };
        info!(count = records.len(), "New vulns this tick");

        self.dispatcher.dispatch(records, &mut refs).await;
    }

    async fn send_start_message(&self, vuln_count: usize) -> Result<()> {
        let providers: Vec<Provider> = self.sources.iter().map(|s| s.provider()).collect();
        let msg = InitialMessage {
            version: self.config.version.clone(),
            vuln_count,
            interval: format_interval(self.config.interval),
            providers,
        };
        self.text
            .push_markdown("vulnwatch initialized", &render_initial(&msg))
            .await?;
        self.raw.push_raw(&RawMessage::initial(msg)).await?;
        Ok(())
    }

    async fn send_exit_notice(&self) {
        let notice = "vulnwatch process exiting";
        if let Err(e) = self.text.push_text(notice).await {
            error!(error = %e, "Failed to send exit notice");
        }
        if let Err(e) = self.raw.push_raw(&RawMessage::text(notice)).await {
            error!(error = %e, "Failed to send exit notice");
        }
    }
}

/// A tick whose fire time lands in [QUIET_HOURS_START, QUIET_HOURS_END) is a
/// no-op: no collection, no dispatch.
pub fn in_quiet_hours(hour: u32) -> bool {
    (QUIET_HOURS_START..QUIET_HOURS_END).contains(&hour)
}

fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
