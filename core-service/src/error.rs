use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use core_sync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Provider error: {0}")]
    Provider(#[from] BridgeError),

    #[error("access token missing")]
    CredentialMissing { connection_id: String },

    #[error("Sync already in progress for connection {connection_id}")]
    SyncInProgress { connection_id: String },

    #[error("No sync state for connection {connection_id}")]
    StateNotFound { connection_id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::StateNotFound { .. } | ServiceError::CredentialMissing { .. } => true,
            ServiceError::Provider(e) => e.is_not_found(),
            ServiceError::Catalog(CatalogError::NotFound { .. }) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
