//! Harvest pipeline orchestration.
//!
//! One run: read stored bridges → fetch every source page → extract →
//! classify → dedupe → append new records → notify. The returned
//! [`RunReport`] is the only output surfaced to callers.
//!
//! Failure handling per stage:
//!
//! | Stage | On failure |
//! |-------|-----------|
//! | read storage | logged, run starts with nothing known |
//! | fetch one page | page skipped |
//! | fetch every page | "failed to fetch" message, empty report |
//! | classify a line | line listed as malformed |
//! | append a record | rest of that category abandoned; run returns an error after notifying |
//! | notify | logged, next message still sent |

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::classify::{classify, Clock, SystemClock};
use crate::config::Config;
use crate::dedupe::{dedupe, known_sets_from_documents, KnownSets};
use crate::extract::extract_bridge_lines;
use crate::fetch::HttpFetcher;
use crate::models::{BridgeRecord, Category, RunReport};
use crate::notify::{
    create_notifier, render_malformed, DUPLICATE_BRIDGES_TITLE, FETCH_FAILED_MESSAGE,
    NEW_BRIDGES_TITLE,
};
use crate::store::{open_store, RecordStore};
use crate::traits::{Notifier, PageFetcher};

/// Everything one pipeline run needs, shared between the CLI, the
/// scheduler and the HTTP trigger.
pub struct Harvester {
    urls: BTreeMap<Category, String>,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    notify_delay: Duration,
}

impl Harvester {
    pub fn new(
        urls: BTreeMap<Category, String>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            urls,
            fetcher,
            store,
            notifier,
            clock: Arc::new(SystemClock),
            notify_delay: Duration::from_secs(1),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notify_delay(mut self, delay: Duration) -> Self {
        self.notify_delay = delay;
        self
    }

    /// Wires the HTTP fetcher, configured store and notifier.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        let store = open_store(config).await?;
        let notifier = create_notifier(&config.telegram)?;
        Ok(Self::new(config.sources.urls(), fetcher, store, notifier)
            .with_notify_delay(Duration::from_millis(config.pipeline.notify_delay_ms)))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Executes one full run.
    ///
    /// Running twice against unchanged pages and storage persists nothing
    /// the second time and reports every line as a duplicate.
    ///
    /// Unreadable storage starts the run with nothing known, so every line
    /// found is treated as new.
    pub async fn run_once(&self) -> Result<RunReport> {
        let mut known = match self.store.read_all().await {
            Ok(docs) => known_sets_from_documents(&docs),
            Err(e) => {
                warn!("Failed to read stored bridges, starting empty: {:#}", e);
                KnownSets::new()
            }
        };

        let lines = self.fetch_all().await;
        let mut report = RunReport::default();

        if lines.is_empty() {
            warn!("No bridge lines found on any source page");
            notify("fetch failure", self.notifier.send_message(FETCH_FAILED_MESSAGE)).await;
            return Ok(report);
        }

        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            match classify(&line, self.clock.as_ref()) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    debug!("Malformed bridge line ({}): {}", reason, line);
                    report.malformed_bridges.push(line);
                }
            }
        }

        let partition = dedupe(&mut known, records);

        let mut failures = Vec::new();
        for (category, records) in &partition.new {
            let (stored, failure) = self.append_all(*category, records).await;
            if !stored.is_empty() {
                report.new_bridges.insert(*category, stored);
            }
            if let Some(e) = failure {
                failures.push(format!("{}: {:#}", category, e));
            }
        }

        for (category, records) in partition.duplicate {
            report
                .duplicate_bridges
                .insert(category, records.into_iter().map(|r| r.bridge).collect());
        }

        info!(
            new = report.new_count(),
            duplicate = report.duplicate_count(),
            malformed = report.malformed_bridges.len(),
            "Harvest run finished"
        );

        if !report.new_bridges.is_empty() {
            notify(
                "new bridges",
                self.notifier
                    .send_grouped(NEW_BRIDGES_TITLE, &report.new_bridges),
            )
            .await;
            tokio::time::sleep(self.notify_delay).await;
        }

        notify(
            "duplicate bridges",
            self.notifier
                .send_grouped(DUPLICATE_BRIDGES_TITLE, &report.duplicate_bridges),
        )
        .await;

        if !report.malformed_bridges.is_empty() {
            let message = render_malformed(&report.malformed_bridges);
            notify("malformed bridges", self.notifier.send_message(&message)).await;
        }

        if !failures.is_empty() {
            anyhow::bail!("Failed to persist bridges: {}", failures.join("; "));
        }

        Ok(report)
    }

    /// Fetches every source page concurrently and returns the extracted
    /// lines, grouped by source category order. Failed pages contribute
    /// nothing.
    async fn fetch_all(&self) -> Vec<String> {
        let mut tasks = JoinSet::new();
        for (category, url) in &self.urls {
            let fetcher = Arc::clone(&self.fetcher);
            let category = *category;
            let url = url.clone();
            tasks.spawn(async move {
                let result = fetcher.fetch(&url).await;
                (category, url, result)
            });
        }

        let mut pages = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((category, url, Ok(text))) => {
                    let lines = extract_bridge_lines(&text);
                    debug!("{}: {} bridge lines from {}", category, lines.len(), url);
                    pages.insert(category, lines);
                }
                Ok((category, url, Err(e))) => {
                    warn!("Skipping {} source {}: {:#}", category, url, e);
                }
                Err(e) => warn!("Fetch task failed: {}", e),
            }
        }

        pages.into_values().flatten().collect()
    }

    /// Appends records in order, stopping at the first failure. Returns
    /// the lines that were stored and the failure, if any.
    async fn append_all(
        &self,
        category: Category,
        records: &[BridgeRecord],
    ) -> (Vec<String>, Option<anyhow::Error>) {
        let mut stored = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Err(e) = self.store.append(category, record).await {
                error!(
                    "Failed to store {} bridge; abandoning {} remaining: {:#}",
                    category,
                    records.len() - i,
                    e
                );
                return (stored, Some(e));
            }
            stored.push(record.bridge.clone());
        }
        (stored, None)
    }
}

async fn notify<F>(what: &str, send: F)
where
    F: Future<Output = Result<()>>,
{
    if let Err(e) = send.await {
        warn!("Failed to send {} notification: {:#}", what, e);
    }
}
