use thiserror::Error;

/// Startup failures: settings, logging and bridge wiring.
#[derive(Error, Debug)]
pub enum Error {
    /// Settings failed validation or logging could not be set up
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `CATALOG_SYNC_*` variable holds a value that does not parse
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    /// A host bridge the engine needs was not provided
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
