#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    CatalogProvider, ConnectionDirectory, ConnectionId, Credential, ManualClock, RemoteContainer,
    RemoteItem, RemoteItemPage, TextTrack, WebhookRegistration, WebhookRegistrationRequest,
};
use core_catalog::create_test_pool;
use core_runtime::config::{CoreConfig, SyncSettings};
use core_runtime::events::EventBus;
use core_service::CatalogSyncService;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};

pub const START_MILLIS: i64 = 1_700_000_000_000;
pub const CALLBACK_BASE: &str = "https://hooks.example.com";

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

pub fn page_of(first: u32, count: u32, has_more: bool) -> RemoteItemPage {
    RemoteItemPage {
        items: (first..first + count)
            .map(|id| remote_item(&id.to_string()))
            .collect(),
        total: None,
        has_more,
    }
}

/// In-memory provider. Unconfigured pages are exhausted.
#[derive(Default)]
pub struct FakeProvider {
    pages: AsyncMutex<HashMap<u32, RemoteItemPage>>,
    items: AsyncMutex<HashMap<String, RemoteItem>>,
    tracks: AsyncMutex<HashMap<String, TextTrack>>,
    /// When set, `list_items` waits for a notification before answering
    gate: AsyncMutex<Option<Arc<Notify>>>,
    pub list_calls: AsyncMutex<Vec<u32>>,
    pub register_calls: AsyncMutex<Vec<WebhookRegistrationRequest>>,
}

impl FakeProvider {
    pub async fn set_page(&self, page: u32, result: RemoteItemPage) {
        self.pages.lock().await.insert(page, result);
    }

    pub async fn add_item(&self, item: RemoteItem) {
        self.items
            .lock()
            .await
            .insert(item.external_id.clone(), item);
    }

    pub async fn add_track(&self, external_id: &str, track: TextTrack) {
        self.tracks
            .lock()
            .await
            .insert(external_id.to_string(), track);
    }

    /// Hold every page fetch until the returned handle is notified.
    pub async fn hold_pages(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().await = Some(notify.clone());
        notify
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
        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.list_calls.lock().await.push(page);
        Ok(self
            .pages
            .lock()
            .await
            .get(&page)
            .cloned()
            .unwrap_or_else(RemoteItemPage::exhausted))
    }

    async fn get_item(&self, _credential: &Credential, external_id: &str) -> BridgeResult<RemoteItem> {
        self.items
            .lock()
            .await
            .get(external_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("video {}", external_id)))
    }

    async fn list_containers(&self, _credential: &Credential) -> BridgeResult<Vec<RemoteContainer>> {
        Ok(vec![RemoteContainer {
            id: "77".to_string(),
            name: "Lectures".to_string(),
        }])
    }

    async fn register_webhook(
        &self,
        _credential: &Credential,
        request: &WebhookRegistrationRequest,
    ) -> BridgeResult<WebhookRegistration> {
        let mut calls = self.register_calls.lock().await;
        calls.push(request.clone());
        Ok(WebhookRegistration {
            subscription_id: Some(format!("/users/me/webhooks/{}", calls.len())),
            endpoint: "https://api.vimeo.com/me/webhooks".to_string(),
        })
    }

    async fn unregister_webhook(
        &self,
        _credential: &Credential,
        _subscription_id: &str,
    ) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_text_track(
        &self,
        _credential: &Credential,
        external_id: &str,
    ) -> BridgeResult<TextTrack> {
        self.tracks
            .lock()
            .await
            .get(external_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("no text tracks for video {}", external_id)))
    }
}

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

pub struct TestApp {
    pub service: CatalogSyncService,
    pub provider: Arc<FakeProvider>,
    pub directory: Arc<FakeDirectory>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(
            SyncSettings::default()
                .with_page_throttle(Duration::ZERO)
                .with_callback_base_url(CALLBACK_BASE),
        )
        .await
    }

    pub async fn with_settings(settings: SyncSettings) -> Self {
        let provider = Arc::new(FakeProvider::default());
        let directory = Arc::new(FakeDirectory::default());
        let clock = Arc::new(ManualClock::new(START_MILLIS));

        let config = CoreConfig::builder()
            .settings(settings)
            .connection_directory(directory.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        let pool = create_test_pool().await.unwrap();
        let service = CatalogSyncService::new(config, pool, provider.clone(), EventBus::new(64));

        Self {
            service,
            provider,
            directory,
            clock,
        }
    }

    /// Wait until no crawl is running for the connection.
    pub async fn wait_idle(&self, connection_id: &str) {
        for _ in 0..200 {
            if !self.service.is_running(connection_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("crawl for {} did not finish", connection_id);
    }
}
