use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Remote resource does not exist (HTTP 404 or equivalent)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Remote endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the error means the remote resource is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound(_))
            || matches!(self, BridgeError::Http { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
