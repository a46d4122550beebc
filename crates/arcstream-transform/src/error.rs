//! Transform error types
//!
//! Sessions never hand these to callers of `available`/`read`: a fault ends
//! the stream and is kept on the session for inspection. They do surface
//! from construction APIs and from `pack`.

use thiserror::Error;

/// Error type for every fallible transform operation
#[derive(Debug, Error)]
pub enum TransformError {
    /// I/O error on the backing source or destination sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A codec primitive rejected its input or output
    #[error("{codec} codec failed: {reason}")]
    Codec {
        /// Codec name
        codec: &'static str,
        /// What the codec reported
        reason: String,
    },

    /// Resource location metadata is unusable
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Segment table violates its invariants
    #[error("invalid segment table: {0}")]
    InvalidSegmentTable(String),

    /// The transform defines no forward direction
    #[error("{transform} has no forward direction")]
    Unsupported {
        /// Transform name
        transform: &'static str,
    },

    /// Decoded output would exceed the configured ceiling
    #[error("decoded size {size} exceeds limit of {limit} bytes")]
    SizeLimit {
        /// Size that was requested or produced
        size: u64,
        /// Configured ceiling
        limit: u64,
    },

    /// Keystream construction failed
    #[error("cipher error: {0}")]
    Crypto(#[from] arcstream_crypto::CryptoError),

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Binary framing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl TransformError {
    /// Build a codec error from anything printable.
    pub fn codec(codec: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Codec {
            codec,
            reason: reason.to_string(),
        }
    }

    /// Recover an error that an encoder passed back through `io::Write`.
    pub fn from_io(e: std::io::Error) -> Self {
        if e.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            if let Some(Ok(original)) = e.into_inner().map(|inner| inner.downcast::<Self>()) {
                return *original;
            }
            return Self::InvalidResource("encoder failed".to_string());
        }
        Self::Io(e)
    }

    /// `true` for the distinguished "no forward direction" outcome of `pack`.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Result type for transform operations
pub type TransformResult<T> = Result<T, TransformError>;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_unwraps_encoder_errors() {
        let wrapped = io::Error::other(TransformError::InvalidResource("header".into()));
        assert!(matches!(
            TransformError::from_io(wrapped),
            TransformError::InvalidResource(_)
        ));

        let plain = io::Error::new(io::ErrorKind::BrokenPipe, "closed");
        assert!(matches!(TransformError::from_io(plain), TransformError::Io(_)));
    }
}
