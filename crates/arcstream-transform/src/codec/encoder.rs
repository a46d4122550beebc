//! Forward direction of the codecs that have one

use flate2::Compression;
use flate2::write::{DeflateEncoder, ZlibEncoder};
use std::io::{self, Write};

use super::CodecKind;
use crate::config::TransformConfig;
use crate::encode::Encode;
use crate::error::{TransformError, TransformResult};

/// Compress one block of data in memory.
pub fn compress_block(
    codec: CodecKind,
    data: &[u8],
    config: &TransformConfig,
) -> TransformResult<Vec<u8>> {
    match codec {
        CodecKind::Stored => Ok(data.to_vec()),
        CodecKind::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), level(config));
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CodecKind::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level(config));
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CodecKind::Lz4 => Ok(lz4_flex::block::compress(data)),
        CodecKind::Zstd => zstd::encode_all(data, config.zstd_level)
            .map_err(|e| TransformError::codec(codec.name(), e)),
        CodecKind::Explode | CodecKind::Lzx => Err(TransformError::Unsupported {
            transform: codec.name(),
        }),
    }
}

fn level(config: &TransformConfig) -> Compression {
    Compression::new(config.deflate_level.min(9))
}

/// Streaming codec stage in an encoder stack
pub enum CodecEncoder<'a> {
    /// Raw deflate
    Deflate(DeflateEncoder<Box<dyn Encode + 'a>>),
    /// Zlib
    Zlib(ZlibEncoder<Box<dyn Encode + 'a>>),
    /// Zstandard
    Zstd(zstd::stream::write::Encoder<'static, Box<dyn Encode + 'a>>),
    /// LZ4 block; buffered until finish
    Lz4 {
        /// Uncompressed input collected so far
        pending: Vec<u8>,
        /// Next stage
        downstream: Box<dyn Encode + 'a>,
    },
}

impl<'a> CodecEncoder<'a> {
    /// Stack `codec` in front of `downstream`. Stored data needs no stage.
    pub fn wrap(
        codec: CodecKind,
        downstream: Box<dyn Encode + 'a>,
        config: &TransformConfig,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        let stage = match codec {
            CodecKind::Stored => return Ok(downstream),
            CodecKind::Deflate => Self::Deflate(DeflateEncoder::new(downstream, level(config))),
            CodecKind::Zlib => Self::Zlib(ZlibEncoder::new(downstream, level(config))),
            CodecKind::Zstd => Self::Zstd(
                zstd::stream::write::Encoder::new(downstream, config.zstd_level)
                    .map_err(|e| TransformError::codec(codec.name(), e))?,
            ),
            CodecKind::Lz4 => Self::Lz4 {
                pending: Vec::new(),
                downstream,
            },
            CodecKind::Explode | CodecKind::Lzx => {
                return Err(TransformError::Unsupported {
                    transform: codec.name(),
                });
            }
        };
        Ok(Box::new(stage))
    }
}

impl Write for CodecEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Deflate(encoder) => encoder.write(buf),
            Self::Zlib(encoder) => encoder.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
            Self::Lz4 { pending, .. } => {
                pending.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Deflate(encoder) => encoder.flush(),
            Self::Zlib(encoder) => encoder.flush(),
            Self::Zstd(encoder) => encoder.flush(),
            Self::Lz4 { downstream, .. } => downstream.flush(),
        }
    }
}

impl Encode for CodecEncoder<'_> {
    fn finish(self: Box<Self>) -> TransformResult<()> {
        let downstream = match *self {
            Self::Deflate(encoder) => encoder.finish()?,
            Self::Zlib(encoder) => encoder.finish()?,
            Self::Zstd(encoder) => encoder.finish()?,
            Self::Lz4 {
                pending,
                mut downstream,
            } => {
                downstream.write_all(&lz4_flex::block::compress(&pending))?;
                downstream
            }
        };
        downstream.finish()
    }
}
