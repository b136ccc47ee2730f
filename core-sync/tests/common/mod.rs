//! Shared fakes for the sync engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    CatalogProvider, ConnectionDirectory, ConnectionId, Credential, ManualClock, RemoteContainer,
    RemoteItem, RemoteItemPage, TextTrack, WebhookRegistration, WebhookRegistrationRequest,
};
use core_catalog::{create_test_pool, SqliteCatalogRepository};
use core_runtime::events::EventBus;
use core_sync::{
    CrawlerConfig, PageCrawler, SqliteSyncStateRepository, WebhookIngester,
    WebhookSubscriptionManager,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

pub const START_MILLIS: i64 = 1_700_000_000_000;

pub fn remote_item(external_id: &str) -> RemoteItem {
    RemoteItem {
        external_id: external_id.to_string(),
        title: format!("Video {}", external_id),
        description: None,
        embed_url: format!("https://vimeo.com/{}", external_id),
        thumbnail_url: None,
        published_at: 1_000,
    }
}

/// A page of `count` items with ids `first..first+count`
pub fn page_of(first: u32, count: u32, has_more: bool) -> RemoteItemPage {
    RemoteItemPage {
        items: (first..first + count)
            .map(|id| remote_item(&id.to_string()))
            .collect(),
        total: None,
        has_more,
    }
}

fn http_error(status: u16) -> BridgeError {
    if status == 404 {
        BridgeError::NotFound("not found".to_string())
    } else {
        BridgeError::Http {
            status,
            message: "boom".to_string(),
        }
    }
}

// ============================================================================
// Fake Provider
// ============================================================================

/// In-memory provider. Pages not configured are empty.
#[derive(Default)]
pub struct FakeProvider {
    pages: AsyncMutex<HashMap<u32, Result<RemoteItemPage, u16>>>,
    items: AsyncMutex<HashMap<String, RemoteItem>>,
    /// Error status for `register_webhook`
    register_failure: AsyncMutex<Option<u16>>,
    /// Error status for `unregister_webhook`
    unregister_failure: AsyncMutex<Option<u16>>,
    pub list_calls: AsyncMutex<Vec<u32>>,
    pub get_calls: AsyncMutex<Vec<String>>,
    pub register_calls: AsyncMutex<Vec<WebhookRegistrationRequest>>,
    pub unregister_calls: AsyncMutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_page(&self, page: u32, result: RemoteItemPage) {
        self.pages.lock().await.insert(page, Ok(result));
    }

    pub async fn fail_page(&self, page: u32, status: u16) {
        self.pages.lock().await.insert(page, Err(status));
    }

    pub async fn add_item(&self, item: RemoteItem) {
        self.items
            .lock()
            .await
            .insert(item.external_id.clone(), item);
    }

    pub async fn fail_register(&self, status: Option<u16>) {
        *self.register_failure.lock().await = status;
    }

    pub async fn fail_unregister(&self, status: Option<u16>) {
        *self.unregister_failure.lock().await = status;
    }

    pub async fn list_calls(&self) -> Vec<u32> {
        self.list_calls.lock().await.clone()
    }
}

#[async_trait]
impl CatalogProvider for FakeProvider {
    async fn list_items(
        &self,
        _credential: &Credential,
        page: u32,
        _per_page: u32,
    ) -> BridgeResult<RemoteItemPage> {
        self.list_calls.lock().await.push(page);
        match self.pages.lock().await.get(&page) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(status)) => Err(http_error(*status)),
            None => Ok(RemoteItemPage::exhausted()),
        }
    }

    async fn get_item(&self, _credential: &Credential, external_id: &str) -> BridgeResult<RemoteItem> {
        self.get_calls.lock().await.push(external_id.to_string());
        self.items
            .lock()
            .await
            .get(external_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("video {}", external_id)))
    }

    async fn list_containers(&self, _credential: &Credential) -> BridgeResult<Vec<RemoteContainer>> {
        Ok(vec![RemoteContainer {
            id: "1".to_string(),
            name: "Folder".to_string(),
        }])
    }

    async fn register_webhook(
        &self,
        _credential: &Credential,
        request: &WebhookRegistrationRequest,
    ) -> BridgeResult<WebhookRegistration> {
        self.register_calls.lock().await.push(request.clone());
        if let Some(status) = *self.register_failure.lock().await {
            return Err(http_error(status));
        }
        let count = self.register_calls.lock().await.len();
        Ok(WebhookRegistration {
            subscription_id: Some(format!("/users/me/webhooks/{}", count)),
            endpoint: "https://api.vimeo.com/me/webhooks".to_string(),
        })
    }

    async fn unregister_webhook(
        &self,
        _credential: &Credential,
        subscription_id: &str,
    ) -> BridgeResult<()> {
        self.unregister_calls
            .lock()
            .await
            .push(subscription_id.to_string());
        match *self.unregister_failure.lock().await {
            Some(status) => Err(http_error(status)),
            None => Ok(()),
        }
    }

    async fn get_text_track(
        &self,
        _credential: &Credential,
        external_id: &str,
    ) -> BridgeResult<TextTrack> {
        Err(BridgeError::NotFound(format!("no tracks for {}", external_id)))
    }
}

// ============================================================================
// Fake Connection Directory
// ============================================================================

#[derive(Default)]
pub struct FakeDirectory {
    credentials: AsyncMutex<HashMap<String, Credential>>,
}

impl FakeDirectory {
    pub async fn insert(&self, connection_id: &str, token: &str) {
        self.credentials
            .lock()
            .await
            .insert(connection_id.to_string(), Credential::bearer(token));
    }
}

#[async_trait]
impl ConnectionDirectory for FakeDirectory {
    async fn credential(&self, connection_id: &ConnectionId) -> BridgeResult<Option<Credential>> {
        Ok(self
            .credentials
            .lock()
            .await
            .get(connection_id.as_str())
            .cloned())
    }

    async fn list_connections(&self) -> BridgeResult<Vec<ConnectionId>> {
        let mut ids: Vec<ConnectionId> = self
            .credentials
            .lock()
            .await
            .keys()
            .map(|id| ConnectionId::new(id.clone()))
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub provider: Arc<FakeProvider>,
    pub directory: Arc<FakeDirectory>,
    pub catalog: Arc<SqliteCatalogRepository>,
    pub states: Arc<SqliteSyncStateRepository>,
    pub clock: Arc<ManualClock>,
    pub event_bus: EventBus,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = create_test_pool().await.unwrap();
        Self {
            provider: Arc::new(FakeProvider::new()),
            directory: Arc::new(FakeDirectory::default()),
            catalog: Arc::new(SqliteCatalogRepository::new(pool.clone())),
            states: Arc::new(SqliteSyncStateRepository::new(pool)),
            clock: Arc::new(ManualClock::new(START_MILLIS)),
            event_bus: EventBus::new(256),
        }
    }

    pub fn crawler_config(max_pages: u32) -> CrawlerConfig {
        CrawlerConfig {
            per_page: 100,
            max_pages,
            page_throttle: Duration::ZERO,
        }
    }

    pub fn crawler(&self, config: CrawlerConfig) -> PageCrawler {
        PageCrawler::new(
            self.provider.clone(),
            self.catalog.clone(),
            self.states.clone(),
            self.clock.clone(),
            self.event_bus.clone(),
            config,
        )
    }

    pub fn subscriptions(&self) -> WebhookSubscriptionManager {
        WebhookSubscriptionManager::new(
            self.provider.clone(),
            self.states.clone(),
            self.clock.clone(),
            self.event_bus.clone(),
        )
    }

    pub fn ingester(&self) -> WebhookIngester {
        WebhookIngester::new(
            self.provider.clone(),
            self.catalog.clone(),
            self.states.clone(),
            self.directory.clone(),
            self.clock.clone(),
            self.event_bus.clone(),
        )
    }
}

pub fn credential() -> Credential {
    Credential::bearer("token")
}
