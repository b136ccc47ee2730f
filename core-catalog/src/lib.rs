//! # Catalog Store
//!
//! Owns the SQLite database shared by the sync engine: schema migrations,
//! the connection pool and the catalog item repository.
//!
//! ## Overview
//!
//! - Items are keyed by `(connection_id, external_id)`
//! - Upserts are idempotent and report whether a row was created
//! - Deletes only set a tombstone (`deleted_at`); rows are never removed
//! - The `sync_states` table is created here and used by `core-sync`

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{CatalogError, Result};
pub use models::{BatchOutcome, CatalogItem, CatalogItemInput, UpsertOutcome};
pub use repositories::{CatalogRepository, Page, PageRequest, SqliteCatalogRepository};
