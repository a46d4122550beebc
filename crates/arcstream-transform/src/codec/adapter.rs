//! Incremental codec output behind the pull contract

use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::fmt;
use std::io::{self, Read};
use tracing::trace;

use super::CodecKind;
use super::lzx::LzxFrames;
use crate::config::TransformConfig;
use crate::error::{TransformError, TransformResult};
use crate::stream::Decode;

enum Output {
    /// Decompressor pulled through a read-ahead buffer
    Stream {
        reader: Box<dyn Read + Send>,
        buffer: Vec<u8>,
        position: usize,
        filled: usize,
    },
    /// LZ4 block, fully decoded on setup
    Block { data: Vec<u8>, position: usize },
    Lzx(LzxFrames),
}

/// Decodes one compressed input, one byte at a time
///
/// Output stops at the expected decoded length when one is known; a codec
/// that produces less simply ends early.
pub struct CodecAdapter {
    codec: CodecKind,
    output: Output,
    produced: u64,
    expected: Option<u64>,
    limit: u64,
}

impl CodecAdapter {
    /// Set up `codec` over `input`.
    ///
    /// LZ4 blocks are read and decoded here, so their failures surface as
    /// setup failures. Other codecs fail on the pull that reaches bad data.
    pub fn new(
        codec: CodecKind,
        mut input: Box<dyn Read + Send>,
        expected: Option<u64>,
        config: &TransformConfig,
    ) -> TransformResult<Self> {
        let limit = config.max_decompressed_size;
        if let Some(size) = expected {
            if size > limit {
                return Err(TransformError::SizeLimit { size, limit });
            }
        }

        let output = match codec {
            CodecKind::Stored => Self::streaming(input, config),
            CodecKind::Deflate => Self::streaming(Box::new(DeflateDecoder::new(input)), config),
            CodecKind::Zlib => Self::streaming(Box::new(ZlibDecoder::new(input)), config),
            CodecKind::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(input)
                    .map_err(|e| TransformError::codec(codec.name(), e))?;
                Self::streaming(Box::new(decoder), config)
            }
            CodecKind::Lz4 => {
                let size = expected.ok_or_else(|| {
                    TransformError::InvalidResource(
                        "LZ4 block needs a known decompressed length".to_string(),
                    )
                })?;
                let compressed = read_input(codec, &mut input)?;
                let data = lz4_flex::block::decompress(&compressed, size as usize)
                    .map_err(|e| TransformError::codec(codec.name(), e))?;
                Output::Block { data, position: 0 }
            }
            CodecKind::Explode => {
                Self::streaming(Box::new(explode::ExplodeReader::new(input)), config)
            }
            CodecKind::Lzx => {
                let compressed = read_input(codec, &mut input)?;
                Output::Lzx(LzxFrames::new(compressed, config.lzx_window)?)
            }
        };

        trace!(
            "{} adapter ready, expected output {:?} bytes",
            codec.name(),
            expected
        );

        Ok(Self {
            codec,
            output,
            produced: 0,
            expected,
            limit,
        })
    }

    fn streaming(reader: Box<dyn Read + Send>, config: &TransformConfig) -> Output {
        Output::Stream {
            reader,
            buffer: vec![0; config.effective_buffer_size()],
            position: 0,
            filled: 0,
        }
    }

    /// Codec being decoded.
    pub const fn codec(&self) -> CodecKind {
        self.codec
    }

    /// Bytes produced so far.
    pub const fn produced(&self) -> u64 {
        self.produced
    }

    fn next_byte(&mut self) -> TransformResult<Option<u8>> {
        match &mut self.output {
            Output::Stream {
                reader,
                buffer,
                position,
                filled,
            } => {
                if *position == *filled {
                    *filled = loop {
                        match reader.read(&mut buffer[..]) {
                            Ok(count) => break count,
                            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                            Err(e) => return Err(classify(self.codec, e)),
                        }
                    };
                    *position = 0;
                    if *filled == 0 {
                        return Ok(None);
                    }
                }
                let byte = buffer[*position];
                *position += 1;
                Ok(Some(byte))
            }
            Output::Block { data, position } => {
                let byte = data.get(*position).copied();
                if byte.is_some() {
                    *position += 1;
                }
                Ok(byte)
            }
            Output::Lzx(frames) => frames.pull(),
        }
    }
}

impl Decode for CodecAdapter {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        if self.expected.is_some_and(|expected| self.produced >= expected) {
            return Ok(None);
        }
        let Some(byte) = self.next_byte()? else {
            return Ok(None);
        };
        self.produced += 1;
        if self.produced > self.limit {
            return Err(TransformError::SizeLimit {
                size: self.produced,
                limit: self.limit,
            });
        }
        Ok(Some(byte))
    }
}

impl fmt::Debug for CodecAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecAdapter")
            .field("codec", &self.codec)
            .field("produced", &self.produced)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

fn read_input(codec: CodecKind, input: &mut Box<dyn Read + Send>) -> TransformResult<Vec<u8>> {
    let mut data = Vec::new();
    input
        .read_to_end(&mut data)
        .map_err(|e| classify(codec, e))?;
    Ok(data)
}

/// Sort an I/O error from a decompressor into codec failure or source failure.
///
/// Errors raised by a layered decoder come back wrapped; they are unwrapped
/// to their original form.
fn classify(codec: CodecKind, e: io::Error) -> TransformError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
            TransformError::codec(codec.name(), e)
        }
        io::ErrorKind::Other if e.get_ref().is_some_and(|inner| inner.is::<TransformError>()) => {
            match e.into_inner().map(|inner| inner.downcast::<TransformError>()) {
                Some(Ok(original)) => *original,
                _ => TransformError::codec(codec.name(), "layered decoder failed"),
            }
        }
        io::ErrorKind::Other => TransformError::codec(codec.name(), e),
        _ => TransformError::Io(e),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::{Cursor, Write};

    fn adapter(codec: CodecKind, input: Vec<u8>, expected: Option<u64>) -> CodecAdapter {
        CodecAdapter::new(
            codec,
            Box::new(Cursor::new(input)),
            expected,
            &TransformConfig::default(),
        )
        .unwrap()
    }

    fn drain(adapter: &mut CodecAdapter) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(byte) = adapter.pull().unwrap() {
            out.push(byte);
        }
        out
    }

    #[test]
    fn test_stored_passthrough() {
        let mut stored = adapter(CodecKind::Stored, b"plain".to_vec(), None);
        assert_eq!(drain(&mut stored), b"plain");
    }

    #[test]
    fn test_expected_length_truncates_output() {
        let mut stored = adapter(CodecKind::Stored, b"plain text".to_vec(), Some(5));
        assert_eq!(drain(&mut stored), b"plain");
        assert_eq!(stored.produced(), 5);
    }

    #[test]
    fn test_deflate_incremental() {
        let original: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut deflate = adapter(CodecKind::Deflate, compressed, Some(original.len() as u64));
        assert_eq!(drain(&mut deflate), original);
    }

    #[test]
    fn test_lz4_block() {
        let original = b"lz4 lz4 lz4 lz4 lz4 block data".to_vec();
        let compressed = lz4_flex::block::compress(&original);
        let mut lz4 = adapter(CodecKind::Lz4, compressed, Some(original.len() as u64));
        assert_eq!(drain(&mut lz4), original);
    }

    #[test]
    fn test_zstd_stream() {
        let original = b"zstandard zstandard zstandard".to_vec();
        let compressed = zstd::encode_all(&original[..], 3).unwrap();
        let mut zstd = adapter(CodecKind::Zstd, compressed, None);
        assert_eq!(drain(&mut zstd), original);
    }

    // PKWARE DCL sample: literal flag 0, dictionary 4, "AIAIAIAIAIAIA"
    const EXPLODE_SAMPLE: [u8; 8] = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8f, 0x80, 0x7f];

    #[test]
    fn test_explode_stream() {
        let mut explode = adapter(CodecKind::Explode, EXPLODE_SAMPLE.to_vec(), None);
        assert_eq!(drain(&mut explode), b"AIAIAIAIAIAIA");
    }

    #[test]
    fn test_explode_rejects_garbage() {
        let mut explode = adapter(CodecKind::Explode, vec![0xFFu8; 4], None);
        assert!(matches!(
            explode.pull(),
            Err(TransformError::Codec {
                codec: "explode",
                ..
            })
        ));
    }

    #[test]
    fn test_explode_output_over_limit() {
        let config = TransformConfig::default().with_max_decompressed_size(4);
        let mut explode = CodecAdapter::new(
            CodecKind::Explode,
            Box::new(Cursor::new(EXPLODE_SAMPLE.to_vec())),
            None,
            &config,
        )
        .unwrap();
        for expected in b"AIAI" {
            assert_eq!(explode.pull().unwrap(), Some(*expected));
        }
        assert!(matches!(
            explode.pull(),
            Err(TransformError::SizeLimit { size: 5, limit: 4 })
        ));
    }

    #[test]
    fn test_expected_length_over_limit() {
        let config = TransformConfig::default().with_max_decompressed_size(16);
        let result = CodecAdapter::new(
            CodecKind::Stored,
            Box::new(Cursor::new(Vec::new())),
            Some(17),
            &config,
        );
        assert!(matches!(
            result,
            Err(TransformError::SizeLimit { size: 17, limit: 16 })
        ));
    }

    #[test]
    fn test_stream_output_over_limit() {
        let config = TransformConfig::default().with_max_decompressed_size(4);
        let mut stored = CodecAdapter::new(
            CodecKind::Stored,
            Box::new(Cursor::new(b"12345".to_vec())),
            None,
            &config,
        )
        .unwrap();
        for _ in 0..4 {
            assert!(stored.pull().unwrap().is_some());
        }
        assert!(matches!(
            stored.pull(),
            Err(TransformError::SizeLimit { .. })
        ));
    }

    #[test]
    fn test_classify_unwraps_layered_errors() {
        let wrapped = io::Error::other(TransformError::InvalidResource("inner".into()));
        assert!(matches!(
            classify(CodecKind::Zlib, wrapped),
            TransformError::InvalidResource(_)
        ));

        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(matches!(classify(CodecKind::Zlib, eof), TransformError::Io(_)));
    }
}
