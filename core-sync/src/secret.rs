//! Webhook shared secrets

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, SyncError};

/// Random bytes per secret (48 hex characters)
pub const SECRET_BYTES: usize = 24;

/// Mint a secret from the operating system CSPRNG.
///
/// There is no fallback source: if the OS generator fails, so does this.
pub fn mint_secret() -> Result<String> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SyncError::RandomUnavailable(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Compare secrets in time independent of where they differ.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();

    if expected.len() != provided.len() {
        return false;
    }

    expected
        .iter()
        .zip(provided)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
