//! # Sync State Repository
//!
//! Persistence for per-connection [`SyncState`] records.
//!
//! ## Overview
//!
//! `update` is a merge-patch: only the columns named by the patch are
//! written, so a crawl patch and a webhook patch applied concurrently to the
//! same connection both survive. A missing record is created with defaults
//! on first update.

use crate::state::{CrawlPatch, FieldUpdate, SyncState, SyncStatePatch, WebhookPatch};
use crate::Result;
use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for sync state persistence
#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    /// Find the state of a connection
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn get(&self, connection_id: &str) -> Result<Option<SyncState>>;

    /// Apply a merge-patch and return the resulting state
    ///
    /// Creates the record with defaults when it does not exist yet.
    /// `updated_at` is always set to `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn update(
        &self,
        connection_id: &str,
        patch: SyncStatePatch,
        now: i64,
    ) -> Result<SyncState>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SyncStateRepository
pub struct SqliteSyncStateRepository {
    pool: SqlitePool,
}

impl SqliteSyncStateRepository {
    /// Create a new SQLite sync state repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a sync state
#[derive(Debug, FromRow)]
struct SyncStateRow {
    connection_id: String,
    status: String,
    next_page: i64,
    per_page: i64,
    synced_count: i64,
    pages_fetched: i64,
    total_videos: Option<i64>,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    last_error: Option<String>,
    webhook_id: Option<String>,
    webhook_secret: Option<String>,
    webhook_status: String,
    webhook_last_error: Option<String>,
    webhook_last_event_at: Option<i64>,
    updated_at: i64,
}

impl TryFrom<SyncStateRow> for SyncState {
    type Error = crate::SyncError;

    fn try_from(row: SyncStateRow) -> Result<Self> {
        Ok(SyncState {
            connection_id: row.connection_id,
            status: row.status.parse()?,
            next_page: row.next_page.max(1) as u32,
            per_page: row.per_page as u32,
            synced_count: row.synced_count as u64,
            pages_fetched: row.pages_fetched as u32,
            total_videos: row.total_videos.map(|t| t as u64),
            started_at: row.started_at,
            finished_at: row.finished_at,
            last_error: row.last_error,
            webhook_id: row.webhook_id,
            webhook_secret: row.webhook_secret,
            webhook_status: row.webhook_status.parse()?,
            webhook_last_error: row.webhook_last_error,
            webhook_last_event_at: row.webhook_last_event_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_STATE: &str = r#"
    SELECT connection_id, status, next_page, per_page, synced_count, pages_fetched,
           total_videos, started_at, finished_at, last_error,
           webhook_id, webhook_secret, webhook_status, webhook_last_error,
           webhook_last_event_at, updated_at
    FROM sync_states
    WHERE connection_id = ?
"#;

fn push_set<'a, T>(builder: &mut QueryBuilder<'a, Sqlite>, column: &str, value: T)
where
    T: 'a + sqlx::Encode<'a, Sqlite> + sqlx::Type<Sqlite> + Send,
{
    builder.push(", ").push(column).push(" = ").push_bind(value);
}

fn push_field<'a, T, F, V>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    column: &str,
    update: &FieldUpdate<T>,
    encode: F,
) where
    F: Fn(&T) -> V,
    V: 'a + sqlx::Encode<'a, Sqlite> + sqlx::Type<Sqlite> + Send,
{
    match update {
        FieldUpdate::Unchanged => {}
        FieldUpdate::Set(value) => push_set(builder, column, encode(value)),
        FieldUpdate::Clear => {
            builder.push(", ").push(column).push(" = NULL");
        }
    }
}

fn push_crawl_columns(builder: &mut QueryBuilder<'_, Sqlite>, patch: &CrawlPatch) {
    if let Some(status) = patch.status {
        push_set(builder, "status", status.as_str());
    }
    if let Some(next_page) = patch.next_page {
        push_set(builder, "next_page", i64::from(next_page));
    }
    if let Some(per_page) = patch.per_page {
        push_set(builder, "per_page", i64::from(per_page));
    }
    if let Some(synced_count) = patch.synced_count {
        push_set(builder, "synced_count", synced_count as i64);
    }
    if let Some(pages_fetched) = patch.pages_fetched {
        push_set(builder, "pages_fetched", i64::from(pages_fetched));
    }
    push_field(builder, "total_videos", &patch.total_videos, |t| *t as i64);
    push_field(builder, "started_at", &patch.started_at, |t| *t);
    push_field(builder, "finished_at", &patch.finished_at, |t| *t);
    push_field(builder, "last_error", &patch.last_error, String::clone);
}

fn push_webhook_columns(builder: &mut QueryBuilder<'_, Sqlite>, patch: &WebhookPatch) {
    push_field(builder, "webhook_id", &patch.webhook_id, String::clone);
    push_field(builder, "webhook_secret", &patch.webhook_secret, String::clone);
    if let Some(status) = patch.webhook_status {
        push_set(builder, "webhook_status", status.as_str());
    }
    push_field(
        builder,
        "webhook_last_error",
        &patch.webhook_last_error,
        String::clone,
    );
    push_field(
        builder,
        "webhook_last_event_at",
        &patch.webhook_last_event_at,
        |t| *t,
    );
}

#[async_trait]
impl SyncStateRepository for SqliteSyncStateRepository {
    async fn get(&self, connection_id: &str) -> Result<Option<SyncState>> {
        let row = sqlx::query_as::<_, SyncStateRow>(SELECT_STATE)
            .bind(connection_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SyncState::try_from).transpose()
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        connection_id: &str,
        patch: SyncStatePatch,
        now: i64,
    ) -> Result<SyncState> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO sync_states (connection_id, updated_at) VALUES (?, ?)")
            .bind(connection_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE sync_states SET updated_at = ");
        builder.push_bind(now);
        match &patch {
            SyncStatePatch::Crawl(crawl) => push_crawl_columns(&mut builder, crawl),
            SyncStatePatch::Webhook(webhook) => push_webhook_columns(&mut builder, webhook),
        }
        builder.push(" WHERE connection_id = ");
        builder.push_bind(connection_id);
        builder.build().execute(&mut *tx).await?;

        let row = sqlx::query_as::<_, SyncStateRow>(SELECT_STATE)
            .bind(connection_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let state = SyncState::try_from(row)?;
        debug!(
            status = %state.status,
            webhook_status = %state.webhook_status,
            "Sync state updated"
        );
        Ok(state)
    }
}
