//! # Sync State
//!
//! Per-connection state machine shared by the page crawler and the webhook
//! path.
//!
//! ## Field ownership
//!
//! The record is split into two disjoint column groups:
//! - crawl fields (`status`, `next_page`, `per_page`, `synced_count`,
//!   `pages_fetched`, `total_videos`, `started_at`, `finished_at`,
//!   `last_error`), written only by the crawler and the sync control surface
//! - webhook fields (`webhook_id`, `webhook_secret`, `webhook_status`,
//!   `webhook_last_error`, `webhook_last_event_at`), written only by the
//!   subscription manager and the ingester
//!
//! A [`SyncStatePatch`] is either a [`CrawlPatch`] or a [`WebhookPatch`], so
//! one write can never touch both groups. That is what lets both channels
//! write concurrently without compare-and-swap.

use core_runtime::config::DEFAULT_PER_PAGE;
use serde::Serialize;
use std::str::FromStr;

use crate::error::{Result, SyncError};

// ============================================================================
// Status Enums
// ============================================================================

/// Crawl status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Never crawled, or last touched by a newest-page refresh
    #[default]
    Idle,
    Running,
    /// Last crawl stopped on a provider or store failure
    Error,
    Done,
}

impl SyncStatus {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Error => "error",
            SyncStatus::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Error | SyncStatus::Done)
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SyncStatus::Idle),
            "running" => Ok(SyncStatus::Running),
            "error" => Ok(SyncStatus::Error),
            "done" => Ok(SyncStatus::Done),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Push subscription status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    #[default]
    Idle,
    Active,
    Error,
    /// Subscription deliberately removed
    Disabled,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Idle => "idle",
            WebhookStatus::Active => "active",
            WebhookStatus::Error => "error",
            WebhookStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for WebhookStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(WebhookStatus::Idle),
            "active" => Ok(WebhookStatus::Active),
            "error" => Ok(WebhookStatus::Error),
            "disabled" => Ok(WebhookStatus::Disabled),
            _ => Err(SyncError::InvalidWebhookStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Sync State Record
// ============================================================================

/// One connection's sync record. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub connection_id: String,

    pub status: SyncStatus,
    /// Next page the crawler will request (1-based)
    pub next_page: u32,
    /// Fixed for the duration of a crawl
    pub per_page: u32,
    /// Items processed by the crawler in the current run
    pub synced_count: u64,
    pub pages_fetched: u32,
    /// Best-effort total reported by the provider
    pub total_videos: Option<u64>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub last_error: Option<String>,

    /// Remote subscription identifier
    pub webhook_id: Option<String>,
    /// Capability token embedded in the callback URL; never serialized
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    pub webhook_status: WebhookStatus,
    pub webhook_last_error: Option<String>,
    pub webhook_last_event_at: Option<i64>,

    pub updated_at: i64,
}

impl SyncState {
    /// State of a connection that has never been touched.
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            status: SyncStatus::Idle,
            next_page: 1,
            per_page: DEFAULT_PER_PAGE,
            synced_count: 0,
            pages_fetched: 0,
            total_videos: None,
            started_at: None,
            finished_at: None,
            last_error: None,
            webhook_id: None,
            webhook_secret: None,
            webhook_status: WebhookStatus::Idle,
            webhook_last_error: None,
            webhook_last_event_at: None,
            updated_at: 0,
        }
    }

    pub fn has_active_subscription(&self) -> bool {
        self.webhook_status == WebhookStatus::Active && self.webhook_id.is_some()
    }
}

// ============================================================================
// Merge Patches
// ============================================================================

/// Update of a nullable column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the column as it is
    #[default]
    Unchanged,
    Set(T),
    /// Write NULL
    Clear,
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldUpdate::Unchanged)
    }

    /// `Some` sets, `None` clears.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        }
    }
}

/// Patch of the crawl column group. `None` / `Unchanged` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlPatch {
    pub status: Option<SyncStatus>,
    pub next_page: Option<u32>,
    pub per_page: Option<u32>,
    pub synced_count: Option<u64>,
    pub pages_fetched: Option<u32>,
    pub total_videos: FieldUpdate<u64>,
    pub started_at: FieldUpdate<i64>,
    pub finished_at: FieldUpdate<i64>,
    pub last_error: FieldUpdate<String>,
}

impl CrawlPatch {
    /// Reset progress to page 1 and mark the crawl running.
    pub fn restart(per_page: u32, now: i64) -> Self {
        Self {
            status: Some(SyncStatus::Running),
            next_page: Some(1),
            per_page: Some(per_page),
            synced_count: Some(0),
            pages_fetched: Some(0),
            started_at: FieldUpdate::Set(now),
            finished_at: FieldUpdate::Clear,
            last_error: FieldUpdate::Clear,
            ..Self::default()
        }
    }

    /// Continue from the persisted page; counters are kept.
    pub fn resume() -> Self {
        Self {
            status: Some(SyncStatus::Running),
            finished_at: FieldUpdate::Clear,
            last_error: FieldUpdate::Clear,
            ..Self::default()
        }
    }

    /// Progress after a page has been stored.
    pub fn page_stored(
        next_page: u32,
        synced_count: u64,
        pages_fetched: u32,
        total: Option<u64>,
    ) -> Self {
        Self {
            next_page: Some(next_page),
            synced_count: Some(synced_count),
            pages_fetched: Some(pages_fetched),
            total_videos: total.map(FieldUpdate::Set).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn finished(now: i64) -> Self {
        Self {
            status: Some(SyncStatus::Done),
            finished_at: FieldUpdate::Set(now),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>, now: i64) -> Self {
        Self {
            status: Some(SyncStatus::Error),
            last_error: FieldUpdate::Set(message.into()),
            finished_at: FieldUpdate::Set(now),
            ..Self::default()
        }
    }
}

/// Patch of the webhook column group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookPatch {
    pub webhook_id: FieldUpdate<String>,
    pub webhook_secret: FieldUpdate<String>,
    pub webhook_status: Option<WebhookStatus>,
    pub webhook_last_error: FieldUpdate<String>,
    pub webhook_last_event_at: FieldUpdate<i64>,
}

impl WebhookPatch {
    /// Subscription confirmed (or reconfirmed by a delivery).
    pub fn active() -> Self {
        Self {
            webhook_status: Some(WebhookStatus::Active),
            webhook_last_error: FieldUpdate::Clear,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            webhook_status: Some(WebhookStatus::Error),
            webhook_last_error: FieldUpdate::Set(message.into()),
            ..Self::default()
        }
    }

    /// An authenticated delivery arrived.
    pub fn received(at: i64) -> Self {
        Self {
            webhook_last_event_at: FieldUpdate::Set(at),
            ..Self::active()
        }
    }

    pub fn disabled() -> Self {
        Self {
            webhook_id: FieldUpdate::Clear,
            webhook_status: Some(WebhookStatus::Disabled),
            webhook_last_error: FieldUpdate::Clear,
            ..Self::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = FieldUpdate::Set(secret.into());
        self
    }
}

/// A merge-patch confined to one column group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatePatch {
    Crawl(CrawlPatch),
    Webhook(WebhookPatch),
}

impl From<CrawlPatch> for SyncStatePatch {
    fn from(patch: CrawlPatch) -> Self {
        SyncStatePatch::Crawl(patch)
    }
}

impl From<WebhookPatch> for SyncStatePatch {
    fn from(patch: WebhookPatch) -> Self {
        SyncStatePatch::Webhook(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [
            SyncStatus::Idle,
            SyncStatus::Running,
            SyncStatus::Error,
            SyncStatus::Done,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("paused".parse::<SyncStatus>().is_err());
        assert!("gone".parse::<WebhookStatus>().is_err());
    }

    #[test]
    fn test_restart_patch_resets_counters() {
        let patch = CrawlPatch::restart(100, 42);
        assert_eq!(patch.next_page, Some(1));
        assert_eq!(patch.synced_count, Some(0));
        assert_eq!(patch.pages_fetched, Some(0));
        assert_eq!(patch.started_at, FieldUpdate::Set(42));
        assert_eq!(patch.finished_at, FieldUpdate::Clear);
        assert!(patch.total_videos.is_unchanged());
    }

    #[test]
    fn test_received_patch_leaves_subscription_id() {
        let patch = WebhookPatch::received(7);
        assert_eq!(patch.webhook_status, Some(WebhookStatus::Active));
        assert_eq!(patch.webhook_last_event_at, FieldUpdate::Set(7));
        assert!(patch.webhook_id.is_unchanged());
        assert!(patch.webhook_secret.is_unchanged());
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let mut state = SyncState::new("c1");
        state.webhook_secret = Some("s3cr3t".to_string());

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("webhookSecret").is_none());
        assert_eq!(json["nextPage"], 1);
        assert_eq!(json["webhookStatus"], "idle");
    }
}
