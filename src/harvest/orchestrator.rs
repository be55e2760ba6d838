//! Harvest orchestrator - the page cursor loop
//!
//! The orchestrator drives one connector page by page and persists every page
//! before asking for the next one:
//!
//! ```text
//! Idle -> Fetching(min) -> Persisting(min) -> Fetching(min + 1) -> ... -> Done
//! ```
//!
//! A page error or a store error stops the run at once. Pages written before
//! the failure stay in the store.

use crate::config::HarvestConfig;
use crate::harvest::connector::{Connector, Page};
use crate::record::Record;
use crate::store::RecordStore;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Position of the page loop
#[derive(Debug)]
enum HarvestState {
    Idle,
    Fetching(u32),
    Persisting {
        page: u32,
        records: Vec<Record>,
        next: u32,
    },
    Done,
}

/// Totals of a finished harvest
#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub pages: u32,
    pub records_written: usize,
    /// Detail fetches that failed on otherwise successful pages
    pub task_failures: usize,
    /// Field-level warnings attached to written records
    pub field_warnings: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestSummary {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            pages: 0,
            records_written: 0,
            task_failures: 0,
            field_warnings: 0,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Main harvest coordinator
pub struct Orchestrator<C, S> {
    connector: C,
    store: S,
    config: HarvestConfig,
    cancel: CancellationToken,
}

impl<C: Connector, S: RecordStore> Orchestrator<C, S> {
    pub fn new(connector: C, store: S, config: HarvestConfig) -> Self {
        Self {
            connector,
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the run at the next suspension point when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the page loop until the connector is exhausted or the ceiling is hit
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestSummary)` - Every page up to the end was persisted
    /// * `Err(HarvestError::FatalPage)` - The connector failed to read a page
    /// * `Err(HarvestError::CursorDefect)` - The connector returned an invalid cursor
    /// * `Err(HarvestError::Store)` - A batch write failed
    /// * `Err(HarvestError::Cancelled)` - The cancellation token fired
    pub async fn run(&self) -> Result<HarvestSummary, HarvestError> {
        let mut summary = HarvestSummary::start();
        let mut state = HarvestState::Idle;

        tracing::info!(
            "Starting harvest of {} from page {}",
            self.connector.name(),
            self.config.page_min
        );

        loop {
            state = match state {
                HarvestState::Idle => HarvestState::Fetching(self.config.page_min),

                HarvestState::Fetching(page) => {
                    let result = self.fetch(page).await?;
                    self.check_cursor(page, result.next_page)?;

                    if let Some(failures) = &result.failures {
                        summary.task_failures += failures.len();
                        tracing::warn!("Page {}: {}", page, failures);
                    }

                    HarvestState::Persisting {
                        page,
                        records: result.records,
                        next: result.next_page,
                    }
                }

                HarvestState::Persisting {
                    page,
                    records,
                    next,
                } => {
                    summary.field_warnings += log_field_warnings(&records);

                    let written = self.store.write_bulk(&records)?;
                    summary.pages += 1;
                    summary.records_written += written.len();

                    tracing::info!(
                        "Page {}: stored {} records ({} total)",
                        page,
                        written.len(),
                        summary.records_written
                    );

                    if self.is_last(page, next) {
                        HarvestState::Done
                    } else {
                        self.pause().await?;
                        HarvestState::Fetching(next)
                    }
                }

                HarvestState::Done => break,
            };
        }

        summary.finished_at = Utc::now();
        tracing::info!(
            "Harvest of {} completed: {} pages, {} records in {}s",
            self.connector.name(),
            summary.pages,
            summary.records_written,
            summary.elapsed().num_seconds()
        );

        Ok(summary)
    }

    /// Reads one page, racing the cancellation token
    async fn fetch(&self, page: u32) -> Result<Page, HarvestError> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        tracing::info!("Fetching page {} of {}", page, self.connector.name());

        let result = tokio::select! {
            result = self.connector.read_bulk(self.config.limit, page) => result,
            _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled),
        };

        result.map_err(|source| {
            if source.is_cancelled() {
                HarvestError::Cancelled
            } else {
                tracing::error!("Page {} failed: {}", page, source);
                HarvestError::FatalPage { page, source }
            }
        })
    }

    /// Rejects any cursor other than `page + 1` or 0
    fn check_cursor(&self, page: u32, next: u32) -> Result<(), HarvestError> {
        let expected = page.saturating_add(1);
        if next == 0 || next == expected {
            Ok(())
        } else {
            tracing::error!("Page {} returned cursor {}", page, next);
            Err(HarvestError::CursorDefect {
                page,
                next,
                expected,
            })
        }
    }

    fn is_last(&self, page: u32, next: u32) -> bool {
        next == 0 || (self.config.page_max > 0 && page >= self.config.page_max)
    }

    /// Waits between two pages
    async fn pause(&self) -> Result<(), HarvestError> {
        if self.config.page_delay_ms == 0 {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)) => Ok(()),
            _ = self.cancel.cancelled() => Err(HarvestError::Cancelled),
        }
    }
}

/// Logs the field warnings of a page and returns how many there were
fn log_field_warnings(records: &[Record]) -> usize {
    records
        .iter()
        .filter(|record| !record.is_complete())
        .map(|record| {
            let joined = record
                .warnings
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!("Incomplete record {}: {}", record.url, joined);
            record.warnings.len()
        })
        .sum()
}
