//! # Page Crawler
//!
//! Sequential, resumable full sync of one connection's remote catalog.
//!
//! ## Workflow
//!
//! 1. Restart (reset to page 1, zero counters) or resume from the persisted
//!    `next_page`
//! 2. Fetch `next_page` from the provider
//! 3. Stop on an empty page; the provider's "page out of range" signal is
//!    already surfaced as one
//! 4. Batch-upsert the page, advance counters and `next_page`, persist
//! 5. Sleep the politeness throttle and continue
//! 6. Mark the run `done`, or `error` with the failure message
//!
//! A page-count ceiling stops runaway loops without classifying the run as
//! failed. Provider and catalog failures never escape [`PageCrawler::run`];
//! they end up in the persisted state. Only a failure to write the state
//! itself is returned as an error.

use bridge_traits::{CatalogProvider, Clock, Credential};
use core_catalog::{CatalogItemInput, CatalogRepository};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::repository::SyncStateRepository;
use crate::state::{CrawlPatch, SyncStatus};
use crate::Result;

/// Crawl parameters fixed for the lifetime of a crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Page size for restarted crawls; resumed crawls keep the persisted one
    pub per_page: u32,
    /// Hard ceiling on pages fetched by a single run
    pub max_pages: u32,
    /// Pause between two page fetches
    pub page_throttle: Duration,
}

impl From<&SyncSettings> for CrawlerConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            per_page: settings.per_page,
            max_pages: settings.max_pages,
            page_throttle: settings.page_throttle,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

/// Per-invocation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Reset progress instead of resuming from `next_page`
    pub restart: bool,
    /// Page budget for this run, capped by the ceiling
    pub max_pages: Option<u32>,
}

impl SyncOptions {
    pub fn restart() -> Self {
        Self {
            restart: true,
            max_pages: None,
        }
    }

    pub fn resume() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

/// What a crawl run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub connection_id: String,
    /// `Done` or `Error`
    pub status: SyncStatus,
    /// Pages stored by this run
    pub pages_this_run: u32,
    pub synced_count: u64,
    pub pages_fetched: u32,
    pub next_page: u32,
    /// Stopped on the ceiling or page budget rather than an empty page
    pub ceiling_reached: bool,
    pub error: Option<String>,
}

/// Drives full catalog syncs.
pub struct PageCrawler {
    provider: Arc<dyn CatalogProvider>,
    catalog: Arc<dyn CatalogRepository>,
    states: Arc<dyn SyncStateRepository>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    config: CrawlerConfig,
}

impl PageCrawler {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        catalog: Arc<dyn CatalogRepository>,
        states: Arc<dyn SyncStateRepository>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            provider,
            catalog,
            states,
            clock,
            event_bus,
            config,
        }
    }

    fn now(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    /// Run (or resume) a crawl to completion.
    #[instrument(skip(self, credential), fields(connection_id = %connection_id))]
    pub async fn run(
        &self,
        connection_id: &str,
        credential: &Credential,
        options: SyncOptions,
    ) -> Result<CrawlReport> {
        let existing = self.states.get(connection_id).await?;
        let restart = options.restart || existing.is_none();

        let now = self.now();
        let patch = if restart {
            CrawlPatch::restart(self.config.per_page, now)
        } else {
            CrawlPatch::resume()
        };
        let state = self.states.update(connection_id, patch.into(), now).await?;

        info!(
            restart,
            next_page = state.next_page,
            per_page = state.per_page,
            "Starting catalog crawl"
        );
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                connection_id: connection_id.to_string(),
                restart,
                next_page: state.next_page,
            }))
            .ok();

        let per_page = state.per_page;
        let mut next_page = state.next_page;
        let mut synced_count = state.synced_count;
        let mut pages_fetched = state.pages_fetched;

        let budget = options
            .max_pages
            .map_or(self.config.max_pages, |m| m.min(self.config.max_pages));
        let mut pages_this_run = 0u32;
        let mut ceiling_reached = false;

        loop {
            if pages_this_run >= budget {
                warn!(pages_this_run, budget, "Page ceiling reached, stopping crawl");
                ceiling_reached = true;
                break;
            }

            if pages_this_run > 0 && !self.config.page_throttle.is_zero() {
                tokio::time::sleep(self.config.page_throttle).await;
            }

            let page = match self
                .provider
                .list_items(credential, next_page, per_page)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    return self
                        .fail(connection_id, e.to_string(), pages_this_run)
                        .await;
                }
            };

            if page.is_empty() {
                debug!(page = next_page, "Empty page, catalog exhausted");
                break;
            }

            let inputs: Vec<CatalogItemInput> =
                page.items.iter().map(CatalogItemInput::from).collect();
            let outcome = match self
                .catalog
                .upsert_batch(connection_id, &inputs, self.now())
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    return self
                        .fail(connection_id, e.to_string(), pages_this_run)
                        .await;
                }
            };

            let items = inputs.len() as u32;
            let page_number = next_page;
            synced_count += u64::from(items);
            pages_fetched += 1;
            pages_this_run += 1;
            next_page += 1;

            let now = self.now();
            self.states
                .update(
                    connection_id,
                    CrawlPatch::page_stored(next_page, synced_count, pages_fetched, page.total)
                        .into(),
                    now,
                )
                .await?;

            debug!(
                page = page_number,
                items,
                inserted = outcome.inserted,
                updated = outcome.updated,
                synced_count,
                "Page stored"
            );
            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::PageSynced {
                    connection_id: connection_id.to_string(),
                    page: page_number,
                    items,
                    synced_count,
                }))
                .ok();
        }

        let now = self.now();
        self.states
            .update(connection_id, CrawlPatch::finished(now).into(), now)
            .await?;

        info!(
            synced_count,
            pages_fetched, ceiling_reached, "Catalog crawl completed"
        );
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Completed {
                connection_id: connection_id.to_string(),
                synced_count,
                pages_fetched,
                ceiling_reached,
            }))
            .ok();

        Ok(CrawlReport {
            connection_id: connection_id.to_string(),
            status: SyncStatus::Done,
            pages_this_run,
            synced_count,
            pages_fetched,
            next_page,
            ceiling_reached,
            error: None,
        })
    }

    /// Persist a failed run. Used for failures detected before a crawl could
    /// start as well, such as a missing credential.
    pub async fn record_failure(
        &self,
        connection_id: &str,
        message: impl Into<String>,
    ) -> Result<CrawlReport> {
        self.fail(connection_id, message.into(), 0).await
    }

    async fn fail(
        &self,
        connection_id: &str,
        message: String,
        pages_this_run: u32,
    ) -> Result<CrawlReport> {
        error!(error = %message, "Catalog crawl failed");

        let now = self.now();
        let state = self
            .states
            .update(connection_id, CrawlPatch::failed(&message, now).into(), now)
            .await?;

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                connection_id: connection_id.to_string(),
                message: message.clone(),
            }))
            .ok();

        Ok(CrawlReport {
            connection_id: connection_id.to_string(),
            status: SyncStatus::Error,
            pages_this_run,
            synced_count: state.synced_count,
            pages_fetched: state.pages_fetched,
            next_page: state.next_page,
            ceiling_reached: false,
            error: Some(message),
        })
    }
}
