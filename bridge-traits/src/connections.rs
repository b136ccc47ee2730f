//! Connection Directory
//!
//! A connection links this engine to one provider account. Connections and
//! their credentials are owned elsewhere; the engine only looks them up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Opaque identifier of one provider account linkage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Bearer credential used by the provider client.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Lookup of connections and their credentials.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    /// Credential for a connection, `None` when the connection is unknown or
    /// carries no usable token.
    async fn credential(&self, connection_id: &ConnectionId) -> Result<Option<Credential>>;

    /// Every connection of the provider this engine syncs.
    async fn list_connections(&self) -> Result<Vec<ConnectionId>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::bearer("very-private");
        let printed = format!("{:?}", credential);

        assert!(!printed.contains("very-private"));
        assert!(printed.contains("[REDACTED]"));
        assert_eq!(credential.access_token(), "very-private");
    }

    #[test]
    fn test_connection_id_serializes_as_string() {
        let id = ConnectionId::from("conn-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"conn-1\"");
        assert_eq!(id.to_string(), "conn-1");
    }
}
