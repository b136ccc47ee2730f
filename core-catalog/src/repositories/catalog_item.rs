//! Catalog item repository trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::{BatchOutcome, CatalogItem, CatalogItemInput, UpsertOutcome};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqliteConnection, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Catalog store operations keyed by `(connection_id, external_id)`
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert or update one item.
    ///
    /// A new row gets `created_at = updated_at = now`. An existing row has
    /// its mutable fields patched, `updated_at = now`, and any tombstone
    /// cleared; `created_at` is kept.
    async fn upsert(
        &self,
        connection_id: &str,
        item: &CatalogItemInput,
        now: i64,
    ) -> Result<UpsertOutcome>;

    /// Upsert many items in a single transaction.
    async fn upsert_batch(
        &self,
        connection_id: &str,
        items: &[CatalogItemInput],
        now: i64,
    ) -> Result<BatchOutcome>;

    /// Set the tombstone on an existing row.
    ///
    /// # Returns
    /// - `Ok(true)` if a row was found and marked
    /// - `Ok(false)` if there is no such row
    async fn mark_deleted(
        &self,
        connection_id: &str,
        external_id: &str,
        deleted_at: i64,
    ) -> Result<bool>;

    /// Find an item, tombstoned or not.
    async fn find(&self, connection_id: &str, external_id: &str) -> Result<Option<CatalogItem>>;

    /// Live (non-tombstoned) items, newest publish first.
    async fn list_live(
        &self,
        connection_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<CatalogItem>>;

    async fn count_live(&self, connection_id: &str) -> Result<i64>;
}

/// SQLite implementation of CatalogRepository
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate(item: &CatalogItemInput) -> Result<()> {
    item.validate().map_err(|msg| CatalogError::InvalidInput {
        field: "external_id".to_string(),
        message: msg,
    })
}

/// Insert-or-update on one connection; shared by single and batch upserts.
async fn upsert_on(
    conn: &mut SqliteConnection,
    connection_id: &str,
    item: &CatalogItemInput,
    now: i64,
) -> Result<UpsertOutcome> {
    let id = Uuid::new_v4().to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO catalog_items (
            id, connection_id, external_id, title, description,
            embed_url, thumbnail_url, published_at,
            created_at, updated_at, deleted_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
        ON CONFLICT (connection_id, external_id) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(connection_id)
    .bind(&item.external_id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.embed_url)
    .bind(&item.thumbnail_url)
    .bind(item.published_at)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if inserted.rows_affected() == 1 {
        return Ok(UpsertOutcome { id, inserted: true });
    }

    let existing_id = sqlx::query_scalar::<_, String>(
        r#"
        UPDATE catalog_items SET
            title = ?, description = ?, embed_url = ?, thumbnail_url = ?,
            published_at = ?, updated_at = ?, deleted_at = NULL
        WHERE connection_id = ? AND external_id = ?
        RETURNING id
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.embed_url)
    .bind(&item.thumbnail_url)
    .bind(item.published_at)
    .bind(now)
    .bind(connection_id)
    .bind(&item.external_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CatalogError::NotFound {
        entity_type: "CatalogItem".to_string(),
        id: format!("{}/{}", connection_id, item.external_id),
    })?;

    Ok(UpsertOutcome {
        id: existing_id,
        inserted: false,
    })
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    #[instrument(skip(self, item), fields(external_id = %item.external_id))]
    async fn upsert(
        &self,
        connection_id: &str,
        item: &CatalogItemInput,
        now: i64,
    ) -> Result<UpsertOutcome> {
        validate(item)?;

        let mut conn = self.pool.acquire().await?;
        let outcome = upsert_on(&mut *conn, connection_id, item, now).await?;

        debug!(inserted = outcome.inserted, "Catalog item upserted");
        Ok(outcome)
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn upsert_batch(
        &self,
        connection_id: &str,
        items: &[CatalogItemInput],
        now: i64,
    ) -> Result<BatchOutcome> {
        for item in items {
            validate(item)?;
        }

        let mut tx = self.pool.begin().await?;
        let mut batch = BatchOutcome::default();

        for item in items {
            let outcome = upsert_on(&mut *tx, connection_id, item, now).await?;
            batch.record(&outcome);
        }

        tx.commit().await?;

        debug!(
            inserted = batch.inserted,
            updated = batch.updated,
            "Catalog batch upserted"
        );
        Ok(batch)
    }

    async fn mark_deleted(
        &self,
        connection_id: &str,
        external_id: &str,
        deleted_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE catalog_items SET deleted_at = ?, updated_at = ?
            WHERE connection_id = ? AND external_id = ?
            "#,
        )
        .bind(deleted_at)
        .bind(deleted_at)
        .bind(connection_id)
        .bind(external_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, connection_id: &str, external_id: &str) -> Result<Option<CatalogItem>> {
        let item = query_as::<_, CatalogItem>(
            "SELECT * FROM catalog_items WHERE connection_id = ? AND external_id = ?",
        )
        .bind(connection_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn list_live(
        &self,
        connection_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<CatalogItem>> {
        let total = self.count_live(connection_id).await?;

        let items = query_as::<_, CatalogItem>(
            r#"
            SELECT * FROM catalog_items
            WHERE connection_id = ? AND deleted_at IS NULL
            ORDER BY published_at DESC, external_id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(connection_id)
        .bind(page_request.limit() as i64)
        .bind(page_request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, total as u64, page_request))
    }

    async fn count_live(&self, connection_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM catalog_items WHERE connection_id = ? AND deleted_at IS NULL",
        )
        .bind(connection_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn input(external_id: &str, title: &str, published_at: i64) -> CatalogItemInput {
        CatalogItemInput {
            external_id: external_id.to_string(),
            title: title.to_string(),
            description: Some(format!("about {}", title)),
            embed_url: format!("https://vimeo.com/{}", external_id),
            thumbnail_url: None,
            published_at,
        }
    }

    async fn repo() -> SqliteCatalogRepository {
        SqliteCatalogRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = repo().await;

        let first = repo.upsert("c1", &input("555", "Launch", 10), 1_000).await.unwrap();
        assert!(first.inserted);

        let second = repo
            .upsert("c1", &input("555", "Launch (edited)", 10), 2_000)
            .await
            .unwrap();
        assert!(!second.inserted);
        assert_eq!(second.id, first.id);

        let stored = repo.find("c1", "555").await.unwrap().unwrap();
        assert_eq!(stored.title, "Launch (edited)");
        assert_eq!(stored.created_at, 1_000);
        assert_eq!(stored.updated_at, 2_000);
        assert_eq!(repo.count_live("c1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_external_id_on_two_connections() {
        let repo = repo().await;

        assert!(repo.upsert("c1", &input("1", "a", 0), 1).await.unwrap().inserted);
        assert!(repo.upsert("c2", &input("1", "a", 0), 1).await.unwrap().inserted);
        assert_eq!(repo.count_live("c1").await.unwrap(), 1);
        assert_eq!(repo.count_live("c2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_batch_counts() {
        let repo = repo().await;
        repo.upsert("c1", &input("1", "one", 0), 1).await.unwrap();

        let batch = repo
            .upsert_batch(
                "c1",
                &[input("1", "one", 0), input("2", "two", 0), input("3", "three", 0)],
                5,
            )
            .await
            .unwrap();

        assert_eq!(batch, BatchOutcome { inserted: 2, updated: 1 });
        assert_eq!(repo.count_live("c1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_batch_rejects_invalid_items_without_writing() {
        let repo = repo().await;

        let result = repo
            .upsert_batch("c1", &[input("1", "one", 0), input("", "blank", 0)], 5)
            .await;

        assert!(matches!(result, Err(CatalogError::InvalidInput { .. })));
        assert_eq!(repo.count_live("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_deleted_tombstones_but_keeps_row() {
        let repo = repo().await;
        repo.upsert("c1", &input("555", "Launch", 0), 1_000).await.unwrap();

        assert!(repo.mark_deleted("c1", "555", 3_000).await.unwrap());

        let stored = repo.find("c1", "555").await.unwrap().unwrap();
        assert_eq!(stored.deleted_at, Some(3_000));
        assert_eq!(stored.updated_at, 3_000);
        assert_eq!(stored.created_at, 1_000);
        assert_eq!(repo.count_live("c1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_deleted_unknown_item() {
        let repo = repo().await;
        assert!(!repo.mark_deleted("c1", "404", 3_000).await.unwrap());
        assert!(repo.find("c1", "404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_revives_tombstoned_item() {
        let repo = repo().await;
        repo.upsert("c1", &input("555", "Launch", 0), 1_000).await.unwrap();
        repo.mark_deleted("c1", "555", 2_000).await.unwrap();

        let outcome = repo.upsert("c1", &input("555", "Launch", 0), 4_000).await.unwrap();
        assert!(!outcome.inserted);

        let stored = repo.find("c1", "555").await.unwrap().unwrap();
        assert!(!stored.is_deleted());
        assert_eq!(stored.updated_at, 4_000);
    }

    #[tokio::test]
    async fn test_list_live_orders_by_publish_time() {
        let repo = repo().await;
        repo.upsert("c1", &input("1", "old", 100), 1).await.unwrap();
        repo.upsert("c1", &input("2", "new", 300), 1).await.unwrap();
        repo.upsert("c1", &input("3", "mid", 200), 1).await.unwrap();
        repo.upsert("c1", &input("4", "gone", 400), 1).await.unwrap();
        repo.mark_deleted("c1", "4", 2).await.unwrap();

        let page = repo.list_live("c1", PageRequest::new(0, 2)).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(page.total, 3);
        assert!(page.has_next());

        let page = repo.list_live("c1", PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].external_id, "1");
    }
}
