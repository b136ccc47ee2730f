use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Invalid webhook status: {0}")]
    InvalidWebhookStatus(String),

    /// Connection has no usable access credential
    #[error("access token missing")]
    CredentialMissing { connection_id: String },

    #[error("callback base url not configured")]
    CallbackNotConfigured,

    #[error("Invalid callback base URL {url}: {reason}")]
    InvalidCallbackUrl { url: String, reason: String },

    #[error("Secure random source unavailable: {0}")]
    RandomUnavailable(String),

    #[error("Provider error: {0}")]
    Provider(#[from] BridgeError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
