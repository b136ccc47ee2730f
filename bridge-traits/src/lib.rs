//! # Host Bridge Traits
//!
//! Contracts between the catalog sync engine and the world around it.
//!
//! ## Overview
//!
//! The engine never talks to the network, the credential store or the
//! wall clock directly. Each capability is a trait defined here and
//! implemented by an adapter crate (`bridge-desktop`, `provider-vimeo`) or
//! by a test fake.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry
//! - [`CatalogProvider`](catalog::CatalogProvider) - Remote catalog operations
//!
//! ### Connections
//! - [`ConnectionDirectory`](connections::ConnectionDirectory) - Connection and credential lookup
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Mirror structured logs to a host pipeline
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Adapters
//! convert their own errors into it, keeping `NotFound` and HTTP status
//! information distinguishable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; handles are shared as `Arc<dyn Trait>`
//! across the crawler task and concurrent webhook handlers.

pub mod catalog;
pub mod connections;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use catalog::{
    CatalogProvider, RemoteContainer, RemoteItem, RemoteItemPage, TextTrack,
    WebhookRegistration, WebhookRegistrationRequest, WEBHOOK_EVENTS,
};
pub use connections::{ConnectionDirectory, ConnectionId, Credential};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
