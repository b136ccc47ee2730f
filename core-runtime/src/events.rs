//! # Event Bus System
//!
//! Broadcasts typed engine events over `tokio::sync::broadcast` so the HTTP
//! surface, logs and tests can observe crawls and webhook traffic without
//! coupling to the modules that produce them.
//!
//! ## Overview
//!
//! - **Event Types**: [`SyncEvent`], [`WebhookEvent`] and [`CatalogEvent`],
//!   wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Page Crawler ├──────────────>│           │
//! └──────────────┘               │           │     subscribe    ┌────────────┐
//!                                │ EventBus  ├─────────────────>│ Subscriber │
//! ┌──────────────┐     emit      │           │                  └────────────┘
//! │ Webhooks     ├──────────────>│           │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::Failed {
//!         connection_id: "conn-1".to_string(),
//!         message: "access token missing".to_string(),
//!     }))
//!     .ok();
//!
//! assert!(matches!(subscriber.try_recv(), Ok(CoreEvent::Sync(_))));
//! ```
//!
//! Emitting with no subscribers returns an error; producers ignore it with
//! `.ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError};

pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Webhook(WebhookEvent),
    Catalog(CatalogEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Webhook(e) => e.description(),
            CoreEvent::Catalog(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Webhook(WebhookEvent::SubscriptionFailed { .. }) => EventSeverity::Error,
            CoreEvent::Webhook(WebhookEvent::Rejected { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Webhook(WebhookEvent::SubscriptionActive { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Connection the event belongs to.
    pub fn connection_id(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.connection_id(),
            CoreEvent::Webhook(e) => e.connection_id(),
            CoreEvent::Catalog(e) => e.connection_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Progress of a page crawl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    Started {
        connection_id: String,
        /// Whether the crawl reset progress to page 1
        restart: bool,
        /// First page this run will request
        next_page: u32,
    },
    PageSynced {
        connection_id: String,
        page: u32,
        /// Items upserted from this page
        items: u32,
        /// Running total across the crawl
        synced_count: u64,
    },
    Completed {
        connection_id: String,
        synced_count: u64,
        pages_fetched: u32,
        /// The run stopped on the page ceiling rather than an empty page
        ceiling_reached: bool,
    },
    Failed {
        connection_id: String,
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::PageSynced { .. } => "Page synced",
            SyncEvent::Completed { .. } => "Sync completed",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }

    fn connection_id(&self) -> &str {
        match self {
            SyncEvent::Started { connection_id, .. }
            | SyncEvent::PageSynced { connection_id, .. }
            | SyncEvent::Completed { connection_id, .. }
            | SyncEvent::Failed { connection_id, .. } => connection_id,
        }
    }
}

// ============================================================================
// Webhook Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WebhookEvent {
    SubscriptionActive {
        connection_id: String,
        subscription_id: Option<String>,
    },
    SubscriptionFailed {
        connection_id: String,
        message: String,
    },
    SubscriptionRemoved {
        connection_id: String,
    },
    /// An authenticated delivery was accepted.
    Received {
        connection_id: String,
        event_type: String,
        external_id: Option<String>,
    },
    /// A delivery failed secret verification.
    Rejected {
        connection_id: String,
    },
}

impl WebhookEvent {
    fn description(&self) -> &str {
        match self {
            WebhookEvent::SubscriptionActive { .. } => "Webhook subscription active",
            WebhookEvent::SubscriptionFailed { .. } => "Webhook subscription failed",
            WebhookEvent::SubscriptionRemoved { .. } => "Webhook subscription removed",
            WebhookEvent::Received { .. } => "Webhook received",
            WebhookEvent::Rejected { .. } => "Webhook rejected",
        }
    }

    fn connection_id(&self) -> &str {
        match self {
            WebhookEvent::SubscriptionActive { connection_id, .. }
            | WebhookEvent::SubscriptionFailed { connection_id, .. }
            | WebhookEvent::SubscriptionRemoved { connection_id }
            | WebhookEvent::Received { connection_id, .. }
            | WebhookEvent::Rejected { connection_id } => connection_id,
        }
    }
}

// ============================================================================
// Catalog Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    ItemUpserted {
        connection_id: String,
        external_id: String,
        /// `true` when the row did not exist before
        inserted: bool,
    },
    ItemDeleted {
        connection_id: String,
        external_id: String,
        /// `false` when there was no row to tombstone
        found: bool,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::ItemUpserted { .. } => "Catalog item upserted",
            CatalogEvent::ItemDeleted { .. } => "Catalog item deleted",
        }
    }

    fn connection_id(&self) -> &str {
        match self {
            CatalogEvent::ItemUpserted { connection_id, .. }
            | CatalogEvent::ItemDeleted { connection_id, .. } => connection_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus that buffers up to `capacity` events per subscriber.
    ///
    /// Subscribers that fall further behind get `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers, or an error when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New independent receiver. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let webhooks_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Webhook(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Waits for the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` when no matching event is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every buffered event that passes the filter.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(Ok(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(connection_id: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Started {
            connection_id: connection_id.to_string(),
            restart: true,
            next_page: 1,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started("c1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(started("c1")).unwrap(), 2);

        assert_eq!(a.recv().await.unwrap(), started("c1"));
        assert_eq!(b.recv().await.unwrap(), started("c1"));
    }

    #[tokio::test]
    async fn test_cloned_bus_shares_channel() {
        let bus = EventBus::new(10);
        let clone = bus.clone();
        let mut sub = bus.subscribe();

        clone.emit(started("c2")).unwrap();
        assert_eq!(sub.recv().await.unwrap().connection_id(), "c2");
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Webhook(_)));

        bus.emit(started("c1")).unwrap();
        bus.emit(CoreEvent::Webhook(WebhookEvent::Rejected {
            connection_id: "c1".to_string(),
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Webhook(WebhookEvent::Rejected { .. })
        ));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for _ in 0..5 {
            bus.emit(started("c1")).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Sync(SyncEvent::Failed {
            connection_id: "c1".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let rejected = CoreEvent::Webhook(WebhookEvent::Rejected {
            connection_id: "c1".to_string(),
        });
        assert_eq!(rejected.severity(), EventSeverity::Warning);

        assert_eq!(started("c1").severity(), EventSeverity::Debug);
        assert!(EventSeverity::Error > EventSeverity::Info);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Catalog(CatalogEvent::ItemDeleted {
            connection_id: "c1".to_string(),
            external_id: "555".to_string(),
            found: true,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Catalog");
        assert_eq!(json["payload"]["event"], "ItemDeleted");
        assert_eq!(json["payload"]["external_id"], "555");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.description(), "Catalog item deleted");
    }

    #[tokio::test]
    async fn test_stream_drain() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        bus.emit(started("c1")).unwrap();
        bus.emit(started("c2")).unwrap();

        let drained = stream.drain();
        assert_eq!(drained.len(), 2);
        assert!(stream.drain().is_empty());
    }
}
