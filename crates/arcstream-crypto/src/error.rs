//! Error types for keystream cipher construction

use thiserror::Error;

/// Errors that can occur while building a keystream cipher
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length
    #[error("Invalid key length: {actual} (must be {min}-{max} bytes)")]
    InvalidKeyLength {
        /// Actual key length in bytes
        actual: usize,
        /// Minimum accepted key length
        min: usize,
        /// Maximum accepted key length
        max: usize,
    },

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidKeyFormat(format!("hex decode failed: {err}"))
    }
}
