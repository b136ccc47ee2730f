//! # Repositories
//!
//! Trait plus SQLite implementation per stored entity.
//!
//! - `CatalogRepository` - catalog items with tombstones
//!
//! Sync state rows live in the same database but are owned by `core-sync`.

pub mod catalog_item;
pub mod pagination;

pub use catalog_item::{CatalogRepository, SqliteCatalogRepository};
pub use pagination::{Page, PageRequest};
