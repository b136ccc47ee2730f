//! Domain models for the catalog store

use bridge_traits::RemoteItem;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// =============================================================================
// Catalog Item
// =============================================================================

/// An item mirrored from a provider account.
///
/// Unique on `(connection_id, external_id)`. `deleted_at` is a tombstone;
/// the row itself stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// Local identifier (UUID v4)
    pub id: String,
    pub connection_id: String,
    /// Provider's identifier for the item
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub embed_url: String,
    pub thumbnail_url: Option<String>,
    /// Provider publish time in epoch milliseconds, 0 when unknown
    pub published_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl CatalogItem {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Mutable fields written by an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemInput {
    pub external_id: String,
    pub title: String,
    pub description: Option<String>,
    pub embed_url: String,
    pub thumbnail_url: Option<String>,
    pub published_at: i64,
}

impl CatalogItemInput {
    pub fn validate(&self) -> Result<(), String> {
        if self.external_id.trim().is_empty() {
            return Err("External id cannot be empty".to_string());
        }

        Ok(())
    }
}

impl From<RemoteItem> for CatalogItemInput {
    fn from(item: RemoteItem) -> Self {
        Self {
            external_id: item.external_id,
            title: item.title,
            description: item.description,
            embed_url: item.embed_url,
            thumbnail_url: item.thumbnail_url,
            published_at: item.published_at,
        }
    }
}

impl From<&RemoteItem> for CatalogItemInput {
    fn from(item: &RemoteItem) -> Self {
        Self::from(item.clone())
    }
}

// =============================================================================
// Upsert results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    /// Local id of the stored row
    pub id: String,
    /// `true` only when the row did not exist before
    pub inserted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub inserted: u32,
    pub updated: u32,
}

impl BatchOutcome {
    pub fn record(&mut self, outcome: &UpsertOutcome) {
        if outcome.inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }

    pub fn total(&self) -> u32 {
        self.inserted + self.updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_from_remote_item() {
        let remote = RemoteItem {
            external_id: "555".to_string(),
            title: "Launch".to_string(),
            description: None,
            embed_url: "https://vimeo.com/555".to_string(),
            thumbnail_url: Some("https://i.vimeocdn.com/555.jpg".to_string()),
            published_at: 1_700_000_000_000,
        };

        let input = CatalogItemInput::from(&remote);
        assert_eq!(input.external_id, "555");
        assert_eq!(input.embed_url, "https://vimeo.com/555");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_blank_external_id_is_invalid() {
        let input = CatalogItemInput {
            external_id: "  ".to_string(),
            title: "x".to_string(),
            description: None,
            embed_url: String::new(),
            thumbnail_url: None,
            published_at: 0,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_batch_outcome_counts() {
        let mut batch = BatchOutcome::default();
        batch.record(&UpsertOutcome {
            id: "a".to_string(),
            inserted: true,
        });
        batch.record(&UpsertOutcome {
            id: "b".to_string(),
            inserted: false,
        });
        assert_eq!(batch, BatchOutcome { inserted: 1, updated: 1 });
        assert_eq!(batch.total(), 2);
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let item = CatalogItem {
            id: "id".to_string(),
            connection_id: "c1".to_string(),
            external_id: "555".to_string(),
            title: "t".to_string(),
            description: None,
            embed_url: "e".to_string(),
            thumbnail_url: None,
            published_at: 0,
            created_at: 1,
            updated_at: 2,
            deleted_at: Some(3),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["externalId"], "555");
        assert_eq!(json["deletedAt"], 3);
        assert!(item.is_deleted());
    }
}
