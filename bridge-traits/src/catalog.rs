//! Catalog Provider Contract
//!
//! The outbound side of catalog sync: everything the engine needs from the
//! remote provider, already mapped out of the provider's wire format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::connections::Credential;
use crate::error::Result;

/// One item of the remote catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Provider-side identifier, unique per connection
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub embed_url: String,
    pub thumbnail_url: Option<String>,
    /// Unix milliseconds
    pub published_at: i64,
}

/// One page of the remote catalog listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItemPage {
    pub items: Vec<RemoteItem>,
    /// Best-effort total reported by the provider
    pub total: Option<u64>,
    pub has_more: bool,
}

impl RemoteItemPage {
    /// Page returned when the provider signals the end of pagination
    pub fn exhausted() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Folder-like grouping of items on the provider side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContainer {
    pub id: String,
    pub name: String,
}

/// Item change kinds a push subscription is registered for
pub const WEBHOOK_EVENTS: [&str; 3] = ["video.added", "video.deleted", "video.updated"];

/// Request to register a push subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRegistrationRequest {
    /// Absolute callback URL, including its capability query parameters
    pub callback_url: String,
    pub events: Vec<String>,
}

impl WebhookRegistrationRequest {
    pub fn for_item_changes(callback_url: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            events: WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// Remote subscription identifier, when the provider returned one
    pub subscription_id: Option<String>,
    /// Which registration endpoint accepted the request
    pub endpoint: String,
}

/// Caption/subtitle track converted to plain text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTrack {
    pub track_id: String,
    pub label: String,
    pub language: Option<String>,
    /// Provider track kind (captions, subtitles, ...)
    pub kind: Option<String>,
    /// Plain text, or the raw markup when stripping left nothing
    pub content: String,
    /// Markup as downloaded
    pub raw: String,
}

/// Remote catalog operations, authenticated per call.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// List one page of the catalog (1-based).
    ///
    /// The provider's "page out of range" signal yields
    /// [`RemoteItemPage::exhausted`], not an error.
    async fn list_items(
        &self,
        credential: &Credential,
        page: u32,
        per_page: u32,
    ) -> Result<RemoteItemPage>;

    /// Fetch one item by its external id.
    async fn get_item(&self, credential: &Credential, external_id: &str) -> Result<RemoteItem>;

    /// List folders/containers.
    async fn list_containers(&self, credential: &Credential) -> Result<Vec<RemoteContainer>>;

    /// Register a push subscription, trying each equivalent endpoint in order.
    async fn register_webhook(
        &self,
        credential: &Credential,
        request: &WebhookRegistrationRequest,
    ) -> Result<WebhookRegistration>;

    /// Delete a push subscription. An already-deleted subscription is success.
    async fn unregister_webhook(&self, credential: &Credential, subscription_id: &str)
        -> Result<()>;

    /// Fetch the preferred text track of an item as plain text.
    async fn get_text_track(&self, credential: &Credential, external_id: &str)
        -> Result<TextTrack>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_request_events() {
        let request = WebhookRegistrationRequest::for_item_changes("https://cb");
        assert_eq!(
            request.events,
            vec!["video.added", "video.deleted", "video.updated"]
        );
    }

    #[test]
    fn test_exhausted_page() {
        let page = RemoteItemPage::exhausted();
        assert!(page.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.total, None);
    }
}
