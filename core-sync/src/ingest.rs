//! # Webhook Ingester
//!
//! Applies one inbound catalog change notification.
//!
//! Deliveries are authenticated by the per-connection secret embedded in the
//! callback URL. A rejected delivery never touches the catalog. An accepted
//! one is acknowledged in the webhook columns first, then classified as a
//! delete (tombstone) or an upsert (fetch the item, store it). Item-level
//! failures are recorded in `webhook_last_error` and reported as
//! [`WebhookOutcome::Failed`]; they are not errors of `handle`.
//!
//! The ingester never writes crawl columns.

use bridge_traits::{CatalogProvider, Clock, ConnectionDirectory, ConnectionId};
use core_catalog::{CatalogItemInput, CatalogRepository};
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus, WebhookEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::repository::SyncStateRepository;
use crate::secret::secrets_match;
use crate::state::WebhookPatch;

/// Message recorded when a delivery fails secret verification
pub const UNAUTHORIZED: &str = "unauthorized";

/// Payload fields that may carry the item reference, most specific first
const ID_CANDIDATES: [&[&str]; 10] = [
    &["uri"],
    &["videoUri"],
    &["resourceUri"],
    &["link"],
    &["video", "uri"],
    &["video", "link"],
    &["resource", "uri"],
    &["data", "uri"],
    &["data", "video", "uri"],
    &["entity", "uri"],
];

/// Payload fields that may name the event
const EVENT_FIELDS: [&str; 4] = ["event", "type", "event_type", "name"];

const DELETE_MARKERS: [&str; 3] = ["delete", "remove", "unavailable"];

/// One inbound delivery
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub connection_id: String,
    pub secret: String,
    /// Event name from a request header, if any
    pub event_hint: Option<String>,
    pub payload: Value,
    /// Epoch milliseconds
    pub received_at: i64,
}

/// What a delivery did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Unauthorized,
    /// Accepted but carried no usable item id
    Ignored,
    Upserted { external_id: String, inserted: bool },
    Deleted { external_id: String, found: bool },
    Failed { message: String },
}

impl WebhookOutcome {
    pub fn is_authorized(&self) -> bool {
        !matches!(self, WebhookOutcome::Unauthorized)
    }
}

/// Event name: the header hint, else the first string payload field, else
/// `"unknown"`.
pub fn event_type(hint: Option<&str>, payload: &Value) -> String {
    hint.map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| {
            EVENT_FIELDS.iter().find_map(|field| {
                payload
                    .get(field)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn is_delete_event(event_type: &str) -> bool {
    let lowered = event_type.to_lowercase();
    DELETE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

fn last_numeric_segment(reference: &str) -> Option<&str> {
    reference
        .split(['/', '?', '#'])
        .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .last()
}

/// Item id from the first candidate field holding a numeric path segment.
pub fn extract_external_id(payload: &Value) -> Option<String> {
    ID_CANDIDATES.iter().find_map(|path| {
        let value = path
            .iter()
            .try_fold(payload, |node, key| node.get(*key))?;
        match value {
            Value::String(s) => last_numeric_segment(s).map(str::to_string),
            Value::Number(n) if n.is_u64() => Some(n.to_string()),
            _ => None,
        }
    })
}

pub struct WebhookIngester {
    provider: Arc<dyn CatalogProvider>,
    catalog: Arc<dyn CatalogRepository>,
    states: Arc<dyn SyncStateRepository>,
    connections: Arc<dyn ConnectionDirectory>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl WebhookIngester {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        catalog: Arc<dyn CatalogRepository>,
        states: Arc<dyn SyncStateRepository>,
        connections: Arc<dyn ConnectionDirectory>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            provider,
            catalog,
            states,
            connections,
            clock,
            event_bus,
        }
    }

    /// Process one delivery.
    ///
    /// # Errors
    ///
    /// Only sync state persistence failures are returned.
    #[instrument(
        skip(self, delivery),
        fields(connection_id = %delivery.connection_id)
    )]
    pub async fn handle(&self, delivery: WebhookDelivery) -> Result<WebhookOutcome> {
        let connection_id = delivery.connection_id.as_str();
        let now = self.clock.unix_timestamp_millis();

        let state = self.states.get(connection_id).await?;
        let authorized = state
            .as_ref()
            .and_then(|s| s.webhook_secret.as_deref())
            .is_some_and(|expected| secrets_match(expected, &delivery.secret));

        if !authorized {
            warn!("Webhook delivery rejected");
            // Ids the directory does not know get no record.
            if state.is_some() || self.is_known_connection(connection_id).await {
                self.states
                    .update(connection_id, WebhookPatch::failed(UNAUTHORIZED).into(), now)
                    .await?;
            }
            self.event_bus
                .emit(CoreEvent::Webhook(WebhookEvent::Rejected {
                    connection_id: connection_id.to_string(),
                }))
                .ok();
            return Ok(WebhookOutcome::Unauthorized);
        }

        self.states
            .update(
                connection_id,
                WebhookPatch::received(delivery.received_at).into(),
                now,
            )
            .await?;

        let event = event_type(delivery.event_hint.as_deref(), &delivery.payload);
        let external_id = extract_external_id(&delivery.payload);

        info!(
            event_type = %event,
            external_id = external_id.as_deref().unwrap_or("<none>"),
            "Webhook delivery accepted"
        );
        self.event_bus
            .emit(CoreEvent::Webhook(WebhookEvent::Received {
                connection_id: connection_id.to_string(),
                event_type: event.clone(),
                external_id: external_id.clone(),
            }))
            .ok();

        let Some(external_id) = external_id else {
            debug!("No item id in payload, nothing to apply");
            return Ok(WebhookOutcome::Ignored);
        };

        let applied = if is_delete_event(&event) {
            self.apply_delete(connection_id, &external_id, delivery.received_at)
                .await
        } else {
            self.apply_upsert(connection_id, &external_id).await
        };

        let now = self.clock.unix_timestamp_millis();
        match applied {
            Ok(outcome) => {
                self.states
                    .update(connection_id, WebhookPatch::active().into(), now)
                    .await?;
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(external_id = %external_id, error = %message, "Webhook delivery failed");
                self.states
                    .update(connection_id, WebhookPatch::failed(&message).into(), now)
                    .await?;
                Ok(WebhookOutcome::Failed { message })
            }
        }
    }

    async fn is_known_connection(&self, connection_id: &str) -> bool {
        match self.connections.list_connections().await {
            Ok(ids) => ids.iter().any(|id| id.as_str() == connection_id),
            Err(e) => {
                warn!(error = %e, "Connection lookup failed, treating as unknown");
                false
            }
        }
    }

    async fn apply_delete(
        &self,
        connection_id: &str,
        external_id: &str,
        deleted_at: i64,
    ) -> Result<WebhookOutcome> {
        let found = self
            .catalog
            .mark_deleted(connection_id, external_id, deleted_at)
            .await?;

        debug!(external_id, found, "Item tombstoned");
        self.event_bus
            .emit(CoreEvent::Catalog(CatalogEvent::ItemDeleted {
                connection_id: connection_id.to_string(),
                external_id: external_id.to_string(),
                found,
            }))
            .ok();

        Ok(WebhookOutcome::Deleted {
            external_id: external_id.to_string(),
            found,
        })
    }

    async fn apply_upsert(&self, connection_id: &str, external_id: &str) -> Result<WebhookOutcome> {
        let credential = self
            .connections
            .credential(&ConnectionId::new(connection_id))
            .await?
            .ok_or_else(|| SyncError::CredentialMissing {
                connection_id: connection_id.to_string(),
            })?;

        let item = self.provider.get_item(&credential, external_id).await?;
        let outcome = self
            .catalog
            .upsert(
                connection_id,
                &CatalogItemInput::from(item),
                self.clock.unix_timestamp_millis(),
            )
            .await?;

        debug!(external_id, inserted = outcome.inserted, "Item upserted");
        self.event_bus
            .emit(CoreEvent::Catalog(CatalogEvent::ItemUpserted {
                connection_id: connection_id.to_string(),
                external_id: external_id.to_string(),
                inserted: outcome.inserted,
            }))
            .ok();

        Ok(WebhookOutcome::Upserted {
            external_id: external_id.to_string(),
            inserted: outcome.inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_precedence() {
        let payload = json!({ "type": "video.deleted", "event": "video.added" });
        assert_eq!(event_type(Some("video.updated"), &payload), "video.updated");
        assert_eq!(event_type(Some("  "), &payload), "video.added");
        assert_eq!(event_type(None, &json!({ "name": "x" })), "x");
        assert_eq!(event_type(None, &json!({})), "unknown");
    }

    #[test]
    fn test_delete_classification() {
        assert!(is_delete_event("video.deleted"));
        assert!(is_delete_event("VIDEO_REMOVED"));
        assert!(is_delete_event("video.unavailable"));
        assert!(!is_delete_event("video.added"));
        assert!(!is_delete_event("unknown"));
    }

    #[test]
    fn test_extract_external_id_candidates() {
        assert_eq!(
            extract_external_id(&json!({ "uri": "/videos/555" })).as_deref(),
            Some("555")
        );
        assert_eq!(
            extract_external_id(&json!({ "video": { "link": "https://vimeo.com/12/34?share=copy#t=1" } }))
                .as_deref(),
            Some("34")
        );
        assert_eq!(
            extract_external_id(&json!({ "uri": "/users/me", "data": { "video": { "uri": "/videos/77" } } }))
                .as_deref(),
            Some("77")
        );
        assert_eq!(extract_external_id(&json!({ "videoUri": 99 })).as_deref(), Some("99"));
        assert_eq!(extract_external_id(&json!({ "uri": "/videos/abc" })), None);
        assert_eq!(extract_external_id(&json!([])), None);
    }
}
