//! Catalog sync façade and HTTP surface.
//!
//! [`CatalogSyncService`] wires the host bridges from a [`CoreConfig`] into
//! the sync engine: the page crawler, the webhook subscription manager and the
//! webhook ingester, all sharing one SQLite pool. [`server::router`] exposes
//! it over HTTP. The `catalog-sync` binary (feature `desktop-shims`) runs the
//! whole thing against the desktop adapters.
//!
//! ```no_run
//! # async fn example(config: core_runtime::config::CoreConfig) -> anyhow::Result<()> {
//! use core_service::CatalogSyncService;
//!
//! let pool = core_catalog::create_test_pool().await?;
//! let service = CatalogSyncService::with_vimeo(config, pool);
//! service.start_sync("connection-1", false);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod server;

pub use error::{Result, ServiceError};
pub use server::router;

use bridge_traits::{
    CatalogProvider, Clock, ConnectionDirectory, ConnectionId, Credential, RemoteContainer,
};
use core_catalog::{
    BatchOutcome, CatalogError, CatalogItem, CatalogItemInput, CatalogRepository, Page, PageRequest,
    SqliteCatalogRepository,
};
use core_runtime::config::{CoreConfig, SyncSettings};
use core_runtime::events::{CoreEvent, EventBus};
use core_sync::{
    CrawlPatch, CrawlReport, CrawlerConfig, FieldUpdate, PageCrawler, SqliteSyncStateRepository,
    SyncOptions, SyncState, SyncStateRepository, SyncStatus, WebhookDelivery, WebhookIngester,
    WebhookOutcome, WebhookSubscriptionManager,
};
use provider_vimeo::VimeoConnector;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::Receiver;
use tracing::{error, info, instrument, warn};

const EVENT_BUS_CAPACITY: usize = 256;

/// Result of one connection's crawl inside a multi-connection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSyncOutcome {
    pub connection_id: String,
    pub report: Option<CrawlReport>,
    /// Set when the crawl could not run at all
    pub error: Option<String>,
}

/// Caption text of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub track_id: String,
    pub label: String,
    pub language: Option<String>,
    pub content: String,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CatalogSyncService {
    settings: SyncSettings,
    provider: Arc<dyn CatalogProvider>,
    connections: Arc<dyn ConnectionDirectory>,
    catalog: Arc<dyn CatalogRepository>,
    states: Arc<dyn SyncStateRepository>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    crawler: Arc<PageCrawler>,
    subscriptions: Arc<WebhookSubscriptionManager>,
    ingester: Arc<WebhookIngester>,
    running: Arc<Mutex<HashSet<String>>>,
}

/// Marks a connection's crawl as in flight until dropped.
struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
    connection_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.connection_id);
    }
}

fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CatalogSyncService {
    /// Create a service around an explicit provider.
    pub fn new(
        config: CoreConfig,
        pool: SqlitePool,
        provider: Arc<dyn CatalogProvider>,
        event_bus: EventBus,
    ) -> Self {
        let CoreConfig {
            settings,
            connection_directory: connections,
            clock,
            ..
        } = config;

        let catalog: Arc<dyn CatalogRepository> =
            Arc::new(SqliteCatalogRepository::new(pool.clone()));
        let states: Arc<dyn SyncStateRepository> = Arc::new(SqliteSyncStateRepository::new(pool));

        let crawler = PageCrawler::new(
            provider.clone(),
            catalog.clone(),
            states.clone(),
            clock.clone(),
            event_bus.clone(),
            CrawlerConfig::from(&settings),
        );
        let subscriptions = WebhookSubscriptionManager::new(
            provider.clone(),
            states.clone(),
            clock.clone(),
            event_bus.clone(),
        );
        let ingester = WebhookIngester::new(
            provider.clone(),
            catalog.clone(),
            states.clone(),
            connections.clone(),
            clock.clone(),
            event_bus.clone(),
        );

        Self {
            settings,
            provider,
            connections,
            catalog,
            states,
            clock,
            event_bus,
            crawler: Arc::new(crawler),
            subscriptions: Arc::new(subscriptions),
            ingester: Arc::new(ingester),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a service backed by the Vimeo API through the configured
    /// HTTP client.
    pub fn with_vimeo(config: CoreConfig, pool: SqlitePool) -> Self {
        let provider = VimeoConnector::new(config.http_client.clone())
            .with_request_timeout(config.settings.request_timeout);
        Self::new(
            config,
            pool,
            Arc::new(provider),
            EventBus::new(EVENT_BUS_CAPACITY),
        )
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Current time in epoch milliseconds
    pub fn now(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn is_running(&self, connection_id: &str) -> bool {
        lock(&self.running).contains(connection_id)
    }

    fn claim(&self, connection_id: &str) -> Option<RunGuard> {
        let claimed = lock(&self.running).insert(connection_id.to_string());
        claimed.then(|| RunGuard {
            running: self.running.clone(),
            connection_id: connection_id.to_string(),
        })
    }

    async fn credential(&self, connection_id: &str) -> Result<Option<Credential>> {
        Ok(self
            .connections
            .credential(&ConnectionId::new(connection_id))
            .await?)
    }

    async fn require_credential(&self, connection_id: &str) -> Result<Credential> {
        self.credential(connection_id)
            .await?
            .ok_or_else(|| ServiceError::CredentialMissing {
                connection_id: connection_id.to_string(),
            })
    }

    fn missing_credential(connection_id: &str) -> String {
        ServiceError::CredentialMissing {
            connection_id: connection_id.to_string(),
        }
        .to_string()
    }

    // ------------------------------------------------------------------------
    // Crawl control
    // ------------------------------------------------------------------------

    /// Launch a crawl in the background.
    ///
    /// Returns `false` without doing anything when a crawl for the connection
    /// is already running in this process.
    pub fn start_sync(&self, connection_id: &str, restart: bool) -> bool {
        let Some(guard) = self.claim(connection_id) else {
            info!(connection_id, "Sync already running, ignoring start request");
            return false;
        };

        let service = self.clone();
        let connection_id = connection_id.to_string();
        let options = if restart {
            SyncOptions::restart()
        } else {
            SyncOptions::resume()
        };

        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = service.crawl(&connection_id, options).await {
                error!(connection_id = %connection_id, error = %e, "Background sync failed");
            }
        });
        true
    }

    /// Run a crawl to completion.
    pub async fn run_sync(&self, connection_id: &str, options: SyncOptions) -> Result<CrawlReport> {
        let _guard = self
            .claim(connection_id)
            .ok_or_else(|| ServiceError::SyncInProgress {
                connection_id: connection_id.to_string(),
            })?;
        self.crawl(connection_id, options).await
    }

    async fn crawl(&self, connection_id: &str, options: SyncOptions) -> Result<CrawlReport> {
        let report = match self.credential(connection_id).await? {
            Some(credential) => self.crawler.run(connection_id, &credential, options).await?,
            None => {
                self.crawler
                    .record_failure(connection_id, Self::missing_credential(connection_id))
                    .await?
            }
        };
        Ok(report)
    }

    pub async fn get_sync_status(&self, connection_id: &str) -> Result<SyncState> {
        self.states
            .get(connection_id)
            .await?
            .ok_or_else(|| ServiceError::StateNotFound {
                connection_id: connection_id.to_string(),
            })
    }

    /// Full restart crawl of every connection, one after another.
    #[instrument(skip(self))]
    pub async fn sync_all_connections(&self) -> Result<Vec<ConnectionSyncOutcome>> {
        let connections = self.connections.list_connections().await?;
        info!(count = connections.len(), "Syncing all connections");

        let mut outcomes = Vec::with_capacity(connections.len());
        for connection in connections {
            let outcome = self
                .run_sync(connection.as_str(), SyncOptions::restart())
                .await;
            outcomes.push(Self::outcome(connection.as_str(), outcome));
        }
        Ok(outcomes)
    }

    /// Re-establish webhooks and re-crawl the newest pages of every connection.
    ///
    /// Webhook failures are only logged. A failing connection never stops the
    /// remaining ones.
    #[instrument(skip(self))]
    pub async fn run_nightly_backstop(&self) -> Result<Vec<ConnectionSyncOutcome>> {
        let connections = self.connections.list_connections().await?;
        let options = SyncOptions::restart().with_max_pages(self.settings.backstop_max_pages);
        info!(
            count = connections.len(),
            max_pages = self.settings.backstop_max_pages,
            "Running nightly backstop"
        );

        let mut outcomes = Vec::with_capacity(connections.len());
        for connection in connections {
            let connection_id = connection.as_str();
            if let Err(e) = self.ensure_webhook(connection_id).await {
                warn!(connection_id, error = %e, "Backstop could not ensure webhook");
            }

            let outcome = self.run_sync(connection_id, options).await;
            outcomes.push(Self::outcome(connection_id, outcome));
        }
        Ok(outcomes)
    }

    fn outcome(connection_id: &str, result: Result<CrawlReport>) -> ConnectionSyncOutcome {
        match result {
            Ok(report) => ConnectionSyncOutcome {
                connection_id: connection_id.to_string(),
                report: Some(report),
                error: None,
            },
            Err(e) => {
                warn!(connection_id, error = %e, "Connection sync did not run");
                ConnectionSyncOutcome {
                    connection_id: connection_id.to_string(),
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Upsert the first page of the remote catalog without touching crawl
    /// progress.
    ///
    /// Holds the connection's crawl slot while it runs, so no crawl can start
    /// underneath it.
    #[instrument(skip(self))]
    pub async fn sync_newest(&self, connection_id: &str) -> Result<BatchOutcome> {
        let _guard = self
            .claim(connection_id)
            .ok_or_else(|| ServiceError::SyncInProgress {
                connection_id: connection_id.to_string(),
            })?;

        let Some(credential) = self.credential(connection_id).await? else {
            let message = Self::missing_credential(connection_id);
            self.crawler.record_failure(connection_id, message).await?;
            return Err(ServiceError::CredentialMissing {
                connection_id: connection_id.to_string(),
            });
        };

        let page = match self
            .provider
            .list_items(&credential, 1, self.settings.per_page)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.crawler.record_failure(connection_id, e.to_string()).await?;
                return Err(e.into());
            }
        };

        let inputs: Vec<CatalogItemInput> = page.items.iter().map(CatalogItemInput::from).collect();
        let now = self.now();
        let outcome = match self.catalog.upsert_batch(connection_id, &inputs, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.crawler.record_failure(connection_id, e.to_string()).await?;
                return Err(e.into());
            }
        };

        let patch = CrawlPatch {
            status: Some(SyncStatus::Idle),
            finished_at: FieldUpdate::Set(now),
            last_error: FieldUpdate::Clear,
            ..CrawlPatch::default()
        };
        self.states.update(connection_id, patch.into(), now).await?;

        info!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            "Newest items synced"
        );
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Webhooks
    // ------------------------------------------------------------------------

    /// Make sure the connection has an active webhook subscription.
    pub async fn ensure_webhook(&self, connection_id: &str) -> Result<SyncState> {
        let state = match self.credential(connection_id).await? {
            Some(credential) => {
                self.subscriptions
                    .ensure(
                        connection_id,
                        &credential,
                        self.settings.callback_base_url.as_deref(),
                    )
                    .await?
            }
            None => {
                self.subscriptions
                    .record_failure(connection_id, Self::missing_credential(connection_id))
                    .await?
            }
        };
        Ok(state)
    }

    pub async fn remove_webhook(&self, connection_id: &str) -> Result<SyncState> {
        let state = match self.credential(connection_id).await? {
            Some(credential) => self.subscriptions.remove(connection_id, &credential).await?,
            None => {
                self.subscriptions
                    .record_failure(connection_id, Self::missing_credential(connection_id))
                    .await?
            }
        };
        Ok(state)
    }

    pub async fn handle_webhook(&self, delivery: WebhookDelivery) -> Result<WebhookOutcome> {
        Ok(self.ingester.handle(delivery).await?)
    }

    // ------------------------------------------------------------------------
    // Provider and catalog queries
    // ------------------------------------------------------------------------

    pub async fn list_containers(&self, connection_id: &str) -> Result<Vec<RemoteContainer>> {
        let credential = self.require_credential(connection_id).await?;
        Ok(self.provider.list_containers(&credential).await?)
    }

    /// Caption text for one item.
    pub async fn fetch_transcript(
        &self,
        connection_id: &str,
        external_id: &str,
    ) -> Result<Transcript> {
        let credential = self.require_credential(connection_id).await?;
        let track = self.provider.get_text_track(&credential, external_id).await?;
        Ok(Transcript {
            content: track.content,
            track_id: track.track_id,
            label: track.label,
            language: track.language,
        })
    }

    /// Stored item, tombstoned or not.
    pub async fn get_item(&self, connection_id: &str, external_id: &str) -> Result<CatalogItem> {
        self.catalog
            .find(connection_id, external_id)
            .await?
            .ok_or_else(|| {
                ServiceError::Catalog(CatalogError::NotFound {
                    entity_type: "CatalogItem".to_string(),
                    id: external_id.to_string(),
                })
            })
    }

    pub async fn list_items(
        &self,
        connection_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<CatalogItem>> {
        Ok(self
            .catalog
            .list_live(connection_id, page_request.clamped())
            .await?)
    }
}
