//! Connection directory backed by SQLite

use async_trait::async_trait;
use bridge_traits::{
    connections::{ConnectionDirectory, ConnectionId, Credential},
    error::{BridgeError, Result},
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

/// A stored provider account linkage
#[derive(Debug, Clone, FromRow)]
pub struct ConnectionRecord {
    pub id: String,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// SQLite-backed [`ConnectionDirectory`].
///
/// Owns a `connections` table holding one access token per connection. The
/// table is created on construction so it can share a pool with the catalog
/// database or live in its own file.
pub struct SqliteConnectionDirectory {
    pool: SqlitePool,
}

impl SqliteConnectionDirectory {
    /// Use an existing pool, creating the `connections` table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id TEXT PRIMARY KEY NOT NULL,
                access_token TEXT NOT NULL,
                display_name TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;

        debug!("Initialized connection directory");

        Ok(Self { pool })
    }

    /// Create an in-memory directory (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::new(pool).await
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Insert a connection or replace its token and name
    pub async fn save_connection(
        &self,
        connection_id: &ConnectionId,
        access_token: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        let now = Self::now();
        sqlx::query(
            r#"
            INSERT INTO connections (id, access_token, display_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                access_token = excluded.access_token,
                display_name = excluded.display_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(connection_id.as_str())
        .bind(access_token)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to save connection: {}", e)))?;

        info!(connection_id = %connection_id, "Saved connection");
        Ok(())
    }

    /// Remove a connection; returns whether it existed
    pub async fn remove_connection(&self, connection_id: &ConnectionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(connection_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::DatabaseError(format!("Failed to remove connection: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Stored connection metadata, without the token
    pub async fn find_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<ConnectionRecord>> {
        sqlx::query_as::<_, ConnectionRecord>(
            "SELECT id, display_name, created_at, updated_at FROM connections WHERE id = ?",
        )
        .bind(connection_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to load connection: {}", e)))
    }
}

#[async_trait]
impl ConnectionDirectory for SqliteConnectionDirectory {
    async fn credential(&self, connection_id: &ConnectionId) -> Result<Option<Credential>> {
        let token: Option<String> =
            sqlx::query_scalar("SELECT access_token FROM connections WHERE id = ?")
                .bind(connection_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    BridgeError::DatabaseError(format!("Failed to load credential: {}", e))
                })?;

        Ok(token
            .filter(|t| !t.trim().is_empty())
            .map(Credential::bearer))
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM connections ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to list connections: {}", e)))?;

        Ok(ids.into_iter().map(ConnectionId::from).collect())
    }
}
