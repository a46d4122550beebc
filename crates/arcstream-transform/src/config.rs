//! Configuration for transform sessions and encoders

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TransformResult;

/// Largest encoded or decoded length a self-describing chunk header may
/// declare before the stream is treated as not chunked at all.
pub const DEFAULT_CHUNK_CEILING: u32 = 100_000;

/// Maximum allowed decoded size (1 GB)
pub const MAX_DECOMPRESSION_SIZE: u64 = 1024 * 1024 * 1024;

/// Tunables shared by every transform built from a config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Sanity ceiling for self-describing chunk length fields
    pub chunk_ceiling: u32,

    /// Decoded bytes per chunk when packing a self-describing chunk stream
    pub pack_chunk_size: u32,

    /// Size of the spacer record between table-described chunks
    pub spacer_length: u32,

    /// Upper bound on any single decoded buffer
    pub max_decompressed_size: u64,

    /// Read-ahead buffer for source cursors and copy loops
    pub buffer_size: usize,

    /// LZX window size in bytes (power of two between 32 KB and 32 MB)
    pub lzx_window: u32,

    /// Zlib / raw deflate level for forward encoding (0-9)
    pub deflate_level: u32,

    /// ZStd level for forward encoding
    pub zstd_level: i32,

    /// Absolute offset the packed chunk stream starts at, for 4-byte alignment
    pub alignment_base: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            chunk_ceiling: DEFAULT_CHUNK_CEILING,
            pack_chunk_size: 65_536,
            spacer_length: 16,
            max_decompressed_size: MAX_DECOMPRESSION_SIZE,
            buffer_size: 8192,
            lzx_window: 64 * 1024,
            deflate_level: 6,
            zstd_level: 3,
            alignment_base: 0,
        }
    }
}

impl TransformConfig {
    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(text: &str) -> TransformResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TransformResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Set the chunk header ceiling
    #[must_use]
    pub const fn with_chunk_ceiling(mut self, ceiling: u32) -> Self {
        self.chunk_ceiling = ceiling;
        self
    }

    /// Set the decoded chunk size used when packing
    #[must_use]
    pub const fn with_pack_chunk_size(mut self, size: u32) -> Self {
        self.pack_chunk_size = size;
        self
    }

    /// Set the spacer record length
    #[must_use]
    pub const fn with_spacer_length(mut self, length: u32) -> Self {
        self.spacer_length = length;
        self
    }

    /// Set the decoded size ceiling
    #[must_use]
    pub const fn with_max_decompressed_size(mut self, size: u64) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Set the LZX window size
    #[must_use]
    pub const fn with_lzx_window(mut self, window: u32) -> Self {
        self.lzx_window = window;
        self
    }

    /// Set the alignment base for packed chunk streams
    #[must_use]
    pub const fn with_alignment_base(mut self, base: u64) -> Self {
        self.alignment_base = base;
        self
    }

    /// Chunk size actually used when packing: never above the ceiling, never zero.
    pub fn effective_pack_chunk_size(&self) -> usize {
        self.pack_chunk_size.min(self.chunk_ceiling).max(1) as usize
    }

    /// Buffer size actually used by cursors: never zero.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformConfig::default();
        assert_eq!(config.chunk_ceiling, 100_000);
        assert_eq!(config.spacer_length, 16);
        // 65536 fits under the ceiling
        assert_eq!(config.effective_pack_chunk_size(), 65_536);
    }

    #[test]
    fn test_pack_chunk_size_capped_by_ceiling() {
        let config = TransformConfig::default().with_pack_chunk_size(500_000);
        assert_eq!(config.effective_pack_chunk_size(), 100_000);

        let config = TransformConfig::default().with_pack_chunk_size(0);
        assert_eq!(config.effective_pack_chunk_size(), 1);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = TransformConfig::from_json(r#"{"spacer_length": 32}"#).unwrap();
        assert_eq!(config.spacer_length, 32);
        assert_eq!(config.chunk_ceiling, DEFAULT_CHUNK_CEILING);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transform.json");
        std::fs::write(&path, r#"{"lzx_window": 131072, "zstd_level": 9}"#).unwrap();

        let config = TransformConfig::from_file(&path).unwrap();
        assert_eq!(config.lzx_window, 131_072);
        assert_eq!(config.zstd_level, 9);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let result = TransformConfig::from_json("{not json");
        assert!(matches!(
            result,
            Err(crate::error::TransformError::Config(_))
        ));
    }
}
