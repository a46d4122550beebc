//! Codec adapters
//!
//! Wraps third-party decompressors behind the pull contract. Streaming
//! codecs (deflate, zlib, zstd, explode) are pulled incrementally; LZ4
//! blocks decode their whole input on setup; LZX decodes one frame at a
//! time.

mod adapter;
mod encoder;
mod lzx;

pub use adapter::CodecAdapter;
pub use encoder::{CodecEncoder, compress_block};
pub use lzx::{LzxFrames, window_size};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TransformConfig;
use crate::encode::Encode;
use crate::error::TransformResult;
use crate::raw::RegionDecoder;
use crate::resource::Resource;
use crate::stream::{Decode, DecodeReader};
use crate::transform::Transform;

/// Compression formats a codec adapter can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodecKind {
    /// No compression
    Stored,
    /// Raw deflate stream, no zlib header
    Deflate,
    /// Zlib-wrapped deflate
    Zlib,
    /// Single LZ4 block; needs the decoded length
    Lz4,
    /// PKWARE DCL implode
    Explode,
    /// LZX frames with 2- or 5-byte frame headers
    Lzx,
    /// Zstandard frame
    Zstd,
}

impl CodecKind {
    /// Short name for logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Deflate => "deflate",
            Self::Zlib => "zlib",
            Self::Lz4 => "lz4",
            Self::Explode => "explode",
            Self::Lzx => "lzx",
            Self::Zstd => "zstd",
        }
    }

    /// Whether an encoder exists for this codec.
    pub const fn has_forward(self) -> bool {
        !matches!(self, Self::Explode | Self::Lzx)
    }

    /// Whether the codec cannot decode without knowing the output size.
    pub const fn requires_decoded_length(self) -> bool {
        matches!(self, Self::Lz4)
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes a whole resource region with one codec
#[derive(Debug, Clone)]
pub struct CodecTransform {
    codec: CodecKind,
    config: TransformConfig,
}

impl CodecTransform {
    /// Codec transform with default configuration.
    pub fn new(codec: CodecKind) -> Self {
        Self::with_config(codec, TransformConfig::default())
    }

    /// Codec transform with explicit configuration.
    pub fn with_config(codec: CodecKind, config: TransformConfig) -> Self {
        Self { codec, config }
    }

    /// The codec applied.
    pub const fn codec(&self) -> CodecKind {
        self.codec
    }
}

impl Transform for CodecTransform {
    fn name(&self) -> &'static str {
        self.codec.name()
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        let region = RegionDecoder::open(resource, self.config.effective_buffer_size())?;
        Ok(Box::new(CodecAdapter::new(
            self.codec,
            Box::new(region.into_cursor()),
            resource.decompressed_length(),
            &self.config,
        )?))
    }

    fn layered_decoder(
        &self,
        resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Ok(Box::new(CodecAdapter::new(
            self.codec,
            Box::new(DecodeReader::new(input)),
            resource.decompressed_length(),
            &self.config,
        )?))
    }

    fn encoder<'a>(
        &self,
        _resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        CodecEncoder::wrap(self.codec, downstream, &self.config)
    }
}
