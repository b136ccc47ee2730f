//! # Webhook Subscription Manager
//!
//! Keeps exactly one active push subscription per connection.
//!
//! Neither `ensure` nor `remove` reports provider failures to the caller;
//! the outcome is always the persisted webhook status.

use bridge_traits::{CatalogProvider, Clock, Credential, WebhookRegistrationRequest};
use core_runtime::events::{CoreEvent, EventBus, WebhookEvent};
use core_runtime::logging::redact_url_secret;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::repository::SyncStateRepository;
use crate::secret::mint_secret;
use crate::state::{FieldUpdate, SyncState, WebhookPatch};

/// Path of the inbound webhook route
pub const WEBHOOK_CALLBACK_PATH: &str = "/api/vimeo/webhook";

/// Build the callback URL a subscription delivers to.
///
/// The connection id and secret travel as query parameters; the URL itself
/// is the capability.
pub fn callback_url(base_url: &str, connection_id: &str, secret: &str) -> Result<String> {
    let parsed = url::Url::parse(base_url).map_err(|e| SyncError::InvalidCallbackUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyncError::InvalidCallbackUrl {
            url: base_url.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }

    Ok(format!(
        "{}{}?connectionId={}&secret={}",
        base_url.trim_end_matches('/'),
        WEBHOOK_CALLBACK_PATH,
        urlencoding::encode(connection_id),
        urlencoding::encode(secret)
    ))
}

pub struct WebhookSubscriptionManager {
    provider: Arc<dyn CatalogProvider>,
    states: Arc<dyn SyncStateRepository>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
}

impl WebhookSubscriptionManager {
    pub fn new(
        provider: Arc<dyn CatalogProvider>,
        states: Arc<dyn SyncStateRepository>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            provider,
            states,
            clock,
            event_bus,
        }
    }

    async fn apply(&self, connection_id: &str, patch: WebhookPatch) -> Result<SyncState> {
        let now = self.clock.unix_timestamp_millis();
        self.states.update(connection_id, patch.into(), now).await
    }

    /// Register a subscription unless an active one is already recorded.
    ///
    /// An existing secret is reused so that a previously handed out callback
    /// URL stays valid across retries.
    #[instrument(skip(self, credential, callback_base_url), fields(connection_id = %connection_id))]
    pub async fn ensure(
        &self,
        connection_id: &str,
        credential: &Credential,
        callback_base_url: Option<&str>,
    ) -> Result<SyncState> {
        let existing = self.states.get(connection_id).await?;
        if let Some(state) = existing.as_ref().filter(|s| s.has_active_subscription()) {
            debug!("Webhook subscription already active");
            return Ok(state.clone());
        }

        let secret = match existing.and_then(|s| s.webhook_secret) {
            Some(secret) => secret,
            None => match mint_secret() {
                Ok(secret) => secret,
                Err(e) => return self.record_failure(connection_id, e.to_string()).await,
            },
        };

        let callback = match callback_base_url
            .ok_or(SyncError::CallbackNotConfigured)
            .and_then(|base| callback_url(base, connection_id, &secret))
        {
            Ok(url) => url,
            Err(e) => {
                return self
                    .fail_with_secret(connection_id, secret, e.to_string())
                    .await
            }
        };

        info!(callback = %redact_url_secret(&callback), "Registering webhook subscription");

        let request = WebhookRegistrationRequest::for_item_changes(callback);
        match self.provider.register_webhook(credential, &request).await {
            Ok(registration) => {
                info!(
                    endpoint = %registration.endpoint,
                    subscription_id = registration.subscription_id.as_deref().unwrap_or("<none>"),
                    "Webhook subscription active"
                );

                let patch = WebhookPatch {
                    webhook_id: FieldUpdate::from_option(registration.subscription_id.clone()),
                    ..WebhookPatch::active()
                }
                .with_secret(secret);
                let state = self.apply(connection_id, patch).await?;

                self.event_bus
                    .emit(CoreEvent::Webhook(WebhookEvent::SubscriptionActive {
                        connection_id: connection_id.to_string(),
                        subscription_id: registration.subscription_id,
                    }))
                    .ok();
                Ok(state)
            }
            Err(e) => self.fail_with_secret(connection_id, secret, e.to_string()).await,
        }
    }

    /// Delete the remote subscription and mark the webhook disabled.
    #[instrument(skip(self, credential), fields(connection_id = %connection_id))]
    pub async fn remove(&self, connection_id: &str, credential: &Credential) -> Result<SyncState> {
        let webhook_id = self
            .states
            .get(connection_id)
            .await?
            .and_then(|s| s.webhook_id);

        if let Some(webhook_id) = webhook_id {
            match self.provider.unregister_webhook(credential, &webhook_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(webhook_id = %webhook_id, "Subscription already gone");
                }
                Err(e) => return self.record_failure(connection_id, e.to_string()).await,
            }
        } else {
            debug!("No subscription recorded, disabling directly");
        }

        let state = self.apply(connection_id, WebhookPatch::disabled()).await?;
        info!("Webhook subscription removed");
        self.event_bus
            .emit(CoreEvent::Webhook(WebhookEvent::SubscriptionRemoved {
                connection_id: connection_id.to_string(),
            }))
            .ok();
        Ok(state)
    }

    /// Persist a subscription failure.
    pub async fn record_failure(
        &self,
        connection_id: &str,
        message: impl Into<String>,
    ) -> Result<SyncState> {
        self.fail(connection_id, WebhookPatch::failed(message)).await
    }

    async fn fail_with_secret(
        &self,
        connection_id: &str,
        secret: String,
        message: String,
    ) -> Result<SyncState> {
        self.fail(connection_id, WebhookPatch::failed(message).with_secret(secret))
            .await
    }

    async fn fail(&self, connection_id: &str, patch: WebhookPatch) -> Result<SyncState> {
        let message = match &patch.webhook_last_error {
            FieldUpdate::Set(message) => message.clone(),
            _ => String::new(),
        };
        warn!(error = %message, "Webhook subscription failed");

        let state = self.apply(connection_id, patch).await?;
        self.event_bus
            .emit(CoreEvent::Webhook(WebhookEvent::SubscriptionFailed {
                connection_id: connection_id.to_string(),
                message,
            }))
            .ok();
        Ok(state)
    }
}
