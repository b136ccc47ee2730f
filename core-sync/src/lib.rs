//! # Catalog Sync Engine
//!
//! Keeps the local catalog consistent with a provider account through two
//! channels that run concurrently:
//! - a resumable, sequential page crawl
//! - webhook deliveries, each applied as an independent unit of work
//!
//! ## Components
//!
//! - **Sync State** (`state`, `repository`): per-connection state machine with
//!   field-disjoint merge-patches
//! - **Page Crawler** (`crawler`): full sync with a page ceiling and throttle
//! - **Subscription Manager** (`subscription`): one active push subscription
//!   per connection, secret minting, callback URLs
//! - **Webhook Ingester** (`ingest`): authenticated delivery handling
//! - **Secrets** (`secret`): CSPRNG minting and constant-time comparison

pub mod crawler;
pub mod error;
pub mod ingest;
pub mod repository;
pub mod secret;
pub mod state;
pub mod subscription;

pub use crawler::{CrawlReport, CrawlerConfig, PageCrawler, SyncOptions};
pub use error::{Result, SyncError};
pub use ingest::{WebhookDelivery, WebhookIngester, WebhookOutcome};
pub use repository::{SqliteSyncStateRepository, SyncStateRepository};
pub use state::{
    CrawlPatch, FieldUpdate, SyncState, SyncStatePatch, SyncStatus, WebhookPatch, WebhookStatus,
};
pub use subscription::{callback_url, WebhookSubscriptionManager, WEBHOOK_CALLBACK_PATH};
