//! Self-describing chunk streams
//!
//! ```text
//! +------------------+------------------+-----------------+-----------+
//! | encoded: i32 LE  | decoded: i32 LE  | encoded bytes   | 0-3 zeros |
//! +------------------+------------------+-----------------+-----------+
//! ```
//!
//! Padding aligns the next header to a multiple of 4 in absolute offsets.
//! A header declaring a negative length or one above the ceiling ends the
//! stream cleanly; data that was never chunked reads as empty rather than
//! as garbage.
//!
//! The frames may also be read from another transform's output, such as a
//! cipher layered underneath. Offsets then count from the resource start as
//! if the decoded bytes sat in the source.

use binrw::{BinRead, BinWrite};
use std::fmt;
use std::io::{self, Cursor, Write};
use tracing::{debug, trace, warn};

use crate::codec::{CodecAdapter, CodecKind, compress_block};
use crate::config::TransformConfig;
use crate::encode::Encode;
use crate::error::{TransformError, TransformResult};
use crate::raw::RegionDecoder;
use crate::resource::Resource;
use crate::source::SourceCursor;
use crate::stream::Decode;
use crate::transform::Transform;

/// Size of a chunk frame header in bytes
pub const FRAME_HEADER_SIZE: u64 = 8;

/// Zero padding after a chunk ending at absolute offset `end`.
pub const fn padding_for(end: u64) -> u64 {
    (4 - end % 4) % 4
}

/// Chunk frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ChunkFrameHeader {
    /// Stored payload length
    pub encoded_length: i32,
    /// Length after decoding the payload
    pub decoded_length: i32,
}

impl ChunkFrameHeader {
    /// Header for a payload of `encoded` bytes decoding to `decoded` bytes.
    pub fn new(encoded: usize, decoded: usize) -> TransformResult<Self> {
        let field = |value: usize| {
            i32::try_from(value).map_err(|_| TransformError::SizeLimit {
                size: value as u64,
                limit: i32::MAX as u64,
            })
        };
        Ok(Self {
            encoded_length: field(encoded)?,
            decoded_length: field(decoded)?,
        })
    }

    /// Both lengths, when neither is negative nor above `ceiling`.
    pub fn lengths(&self, ceiling: u32) -> Option<(u64, u64)> {
        let check = |value: i32| {
            u32::try_from(value)
                .ok()
                .filter(|value| *value <= ceiling)
                .map(u64::from)
        };
        Some((check(self.encoded_length)?, check(self.decoded_length)?))
    }

    /// Serialize to the 8-byte wire form.
    pub fn to_bytes(&self) -> TransformResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(FRAME_HEADER_SIZE as usize));
        self.write_le(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Chunk streams whose framing lives inline with the data
#[derive(Debug, Clone)]
pub struct FramedChunks {
    codec: CodecKind,
    config: TransformConfig,
}

impl FramedChunks {
    /// Chunk stream with every payload compressed by `codec`.
    pub fn new(codec: CodecKind) -> Self {
        Self::with_config(codec, TransformConfig::default())
    }

    /// Chunk stream with explicit configuration.
    pub fn with_config(codec: CodecKind, config: TransformConfig) -> Self {
        Self { codec, config }
    }
}

impl Transform for FramedChunks {
    fn name(&self) -> &'static str {
        "framed-chunks"
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        Ok(Box::new(FramedDecoder::open(
            resource,
            self.codec,
            self.config.clone(),
        )?))
    }

    fn layered_decoder(
        &self,
        resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Ok(Box::new(FramedDecoder::layered(
            resource,
            input,
            self.codec,
            self.config.clone(),
        )))
    }

    fn encoder<'a>(
        &self,
        _resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        if !self.codec.has_forward() {
            return Err(TransformError::Unsupported {
                transform: self.name(),
            });
        }
        Ok(Box::new(FramedEncoder::new(
            self.codec,
            self.config.clone(),
            downstream,
        )))
    }
}

/// Where frame bytes come from
enum FrameInput {
    Region(SourceCursor),
    Layered {
        inner: Box<dyn Decode>,
        position: u64,
        limit: u64,
    },
}

impl FrameInput {
    fn position(&self) -> u64 {
        match self {
            Self::Region(cursor) => cursor.position(),
            Self::Layered { position, .. } => *position,
        }
    }

    /// Upper bound on the bytes left; layered input may end sooner.
    fn remaining(&self) -> u64 {
        match self {
            Self::Region(cursor) => cursor.remaining(),
            Self::Layered {
                position, limit, ..
            } => limit.saturating_sub(*position),
        }
    }

    /// Read up to `len` bytes; shorter only when layered input runs dry.
    fn read_vec(&mut self, len: usize) -> TransformResult<Vec<u8>> {
        match self {
            Self::Region(cursor) => Ok(cursor.read_vec(len)?),
            Self::Layered {
                inner, position, ..
            } => {
                let mut data = Vec::with_capacity(len);
                while data.len() < len {
                    let Some(byte) = inner.pull()? else {
                        break;
                    };
                    data.push(byte);
                }
                *position += data.len() as u64;
                Ok(data)
            }
        }
    }

    fn skip(&mut self, count: u64) -> TransformResult<()> {
        if let Self::Region(cursor) = self {
            cursor.skip(count);
            return Ok(());
        }
        self.read_vec(count as usize).map(drop)
    }
}

impl fmt::Debug for FrameInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Region(cursor) => f.debug_tuple("Region").field(cursor).finish(),
            Self::Layered {
                position, limit, ..
            } => f
                .debug_struct("Layered")
                .field("position", position)
                .field("limit", limit)
                .finish_non_exhaustive(),
        }
    }
}

/// Decoder session over a self-describing chunk stream
#[derive(Debug)]
pub struct FramedDecoder {
    input: FrameInput,
    codec: CodecKind,
    config: TransformConfig,
    consumed: u64,
    total: u64,
    chunk: Option<CodecAdapter>,
    chunks: usize,
}

impl FramedDecoder {
    /// Validate the region and position at the first header.
    pub fn open(
        resource: &Resource,
        codec: CodecKind,
        config: TransformConfig,
    ) -> TransformResult<Self> {
        let cursor = RegionDecoder::open(resource, config.effective_buffer_size())?.into_cursor();
        debug!(
            "Opened {} chunk stream at {} ({} bytes)",
            codec,
            resource.offset(),
            resource.length()
        );
        Ok(Self {
            input: FrameInput::Region(cursor),
            codec,
            config,
            consumed: 0,
            total: resource.length(),
            chunk: None,
            chunks: 0,
        })
    }

    /// Read frames from `input`, another transform's output for `resource`.
    pub fn layered(
        resource: &Resource,
        input: Box<dyn Decode>,
        codec: CodecKind,
        config: TransformConfig,
    ) -> Self {
        debug!(
            "Opened layered {} chunk stream at {} ({} bytes)",
            codec,
            resource.offset(),
            resource.length()
        );
        Self {
            input: FrameInput::Layered {
                inner: input,
                position: resource.offset(),
                limit: resource.offset().saturating_add(resource.length()),
            },
            codec,
            config,
            consumed: 0,
            total: resource.length(),
            chunk: None,
            chunks: 0,
        }
    }

    /// Framing bytes consumed so far: headers, payloads and padding.
    pub const fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Chunks entered so far.
    pub const fn chunks(&self) -> usize {
        self.chunks
    }

    fn malformed(&mut self, detail: &str) {
        warn!(
            "Chunk {} at offset {}: {}, ending stream",
            self.chunks,
            self.input.position(),
            detail
        );
        self.consumed = self.total;
    }

    fn next_chunk(&mut self) -> TransformResult<bool> {
        if self.consumed >= self.total {
            debug!(
                "Chunk stream complete: {} chunks, {} framing bytes",
                self.chunks, self.consumed
            );
            return Ok(false);
        }
        if self.input.remaining() < FRAME_HEADER_SIZE {
            self.malformed("truncated chunk header");
            return Ok(false);
        }

        let header_bytes = self.input.read_vec(FRAME_HEADER_SIZE as usize)?;
        if header_bytes.len() < FRAME_HEADER_SIZE as usize {
            self.malformed("truncated chunk header");
            return Ok(false);
        }
        let header = ChunkFrameHeader::read_le(&mut Cursor::new(&header_bytes))?;
        let Some((encoded, decoded)) = header.lengths(self.config.chunk_ceiling) else {
            self.malformed(&format!(
                "header declares {} encoded / {} decoded bytes",
                header.encoded_length, header.decoded_length
            ));
            return Ok(false);
        };
        if encoded > self.input.remaining() {
            self.malformed(&format!(
                "payload of {encoded} bytes runs past the resource"
            ));
            return Ok(false);
        }

        let payload = self.input.read_vec(encoded as usize)?;
        if (payload.len() as u64) < encoded {
            self.malformed(&format!(
                "payload of {encoded} bytes runs past the layered input"
            ));
            return Ok(false);
        }
        let padding = padding_for(self.input.position());
        self.input.skip(padding)?;
        self.consumed += FRAME_HEADER_SIZE + encoded + padding;

        trace!(
            "Chunk {}: {} -> {} bytes, {} padding",
            self.chunks, encoded, decoded, padding
        );

        self.chunk = Some(CodecAdapter::new(
            self.codec,
            Box::new(Cursor::new(payload)),
            Some(decoded),
            &self.config,
        )?);
        self.chunks += 1;
        Ok(true)
    }
}

impl Decode for FramedDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        loop {
            if let Some(chunk) = self.chunk.as_mut() {
                if let Some(byte) = chunk.pull()? {
                    return Ok(Some(byte));
                }
                self.chunk = None;
            }
            if !self.next_chunk()? {
                return Ok(None);
            }
        }
    }
}

/// Splits its input into fixed-size chunks and frames each one
pub struct FramedEncoder<'a> {
    codec: CodecKind,
    config: TransformConfig,
    chunk_size: usize,
    pending: Vec<u8>,
    position: u64,
    downstream: Box<dyn Encode + 'a>,
}

impl<'a> FramedEncoder<'a> {
    /// Frame chunks into `downstream`.
    pub fn new(codec: CodecKind, config: TransformConfig, downstream: Box<dyn Encode + 'a>) -> Self {
        Self {
            codec,
            chunk_size: config.effective_pack_chunk_size(),
            position: config.alignment_base,
            config,
            pending: Vec::new(),
            downstream,
        }
    }

    fn emit(&mut self, data: &[u8]) -> TransformResult<()> {
        let payload = compress_block(self.codec, data, &self.config)?;
        let ceiling = u64::from(self.config.chunk_ceiling);
        if payload.len() as u64 > ceiling {
            return Err(TransformError::SizeLimit {
                size: payload.len() as u64,
                limit: ceiling,
            });
        }

        let header = ChunkFrameHeader::new(payload.len(), data.len())?;
        self.downstream.write_all(&header.to_bytes()?)?;
        self.downstream.write_all(&payload)?;
        self.position += FRAME_HEADER_SIZE + payload.len() as u64;

        let padding = padding_for(self.position);
        self.downstream.write_all(&[0u8; 3][..padding as usize])?;
        self.position += padding;

        trace!(
            "Packed chunk: {} -> {} bytes, {} padding",
            data.len(),
            payload.len(),
            padding
        );
        Ok(())
    }

    fn emit_full_chunks(&mut self) -> TransformResult<()> {
        while self.pending.len() >= self.chunk_size {
            let rest = self.pending.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.pending, rest);
            self.emit(&chunk)?;
        }
        Ok(())
    }
}

impl Write for FramedEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.emit_full_chunks().map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.downstream.flush()
    }
}

impl Encode for FramedEncoder<'_> {
    fn finish(mut self: Box<Self>) -> TransformResult<()> {
        self.emit_full_chunks()?;
        if !self.pending.is_empty() {
            let last = std::mem::take(&mut self.pending);
            self.emit(&last)?;
        }
        self.downstream.finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::raw::Raw;
    use crate::source::MemorySource;
    use crate::stream::Stream;
    use crate::test_utils::{frame_chunks, framed_resource};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_padding_values() {
        assert_eq!(padding_for(13), 3);
        assert_eq!(padding_for(14), 2);
        assert_eq!(padding_for(15), 1);
        assert_eq!(padding_for(16), 0);
        assert_eq!(padding_for(0), 0);
    }

    #[test]
    fn test_header_wire_form() {
        let header = ChunkFrameHeader::new(5, 300).unwrap();
        assert_eq!(header.to_bytes().unwrap(), [5, 0, 0, 0, 0x2C, 0x01, 0, 0]);

        let parsed = ChunkFrameHeader::read_le(&mut Cursor::new([5u8, 0, 0, 0, 0x2C, 0x01, 0, 0]))
            .unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_ceiling() {
        let ok = ChunkFrameHeader {
            encoded_length: 100_000,
            decoded_length: 0,
        };
        assert_eq!(ok.lengths(100_000), Some((100_000, 0)));

        let big = ChunkFrameHeader {
            encoded_length: 150_000,
            decoded_length: 10,
        };
        assert_eq!(big.lengths(100_000), None);

        let negative = ChunkFrameHeader {
            encoded_length: 10,
            decoded_length: -1,
        };
        assert_eq!(negative.lengths(100_000), None);
    }

    #[test]
    fn test_stored_chunks_with_padding() {
        // 8 + 5 = 13 -> 3 padding bytes; second chunk starts at 16
        let stream = frame_chunks(&[(b"hello", 5), (b"world!!!", 8)]);
        assert_eq!(&stream[13..16], &[0, 0, 0]);
        assert_eq!(stream.len(), 16 + 8 + 8);

        let resource = framed_resource(stream, CodecKind::Stored);
        let mut decoder =
            FramedDecoder::open(&resource, CodecKind::Stored, TransformConfig::default()).unwrap();

        let mut out = Vec::new();
        while let Some(byte) = decoder.pull().unwrap() {
            out.push(byte);
        }
        assert_eq!(out, b"helloworld!!!");
        assert_eq!(decoder.consumed(), resource.length());
        assert_eq!(decoder.chunks(), 2);
    }

    #[test]
    fn test_decoded_length_caps_chunk_output() {
        let stream = frame_chunks(&[(b"abcdefgh", 3)]);
        let resource = framed_resource(stream, CodecKind::Stored);
        let mut stream = FramedChunks::new(CodecKind::Stored).open(&resource);
        assert_eq!(stream.drain(), b"abc");
    }

    #[test]
    fn test_oversized_header_ends_immediately() {
        let mut data = Vec::new();
        data.extend_from_slice(&150_000i32.to_le_bytes());
        data.extend_from_slice(&10i32.to_le_bytes());
        data.extend_from_slice(&[0xAA; 32]);

        let resource = framed_resource(data, CodecKind::Stored);
        let mut stream = FramedChunks::new(CodecKind::Stored).open(&resource);
        assert!(!stream.available());
        assert_eq!(stream.read(), 0);
        assert!(stream.fault().is_none());
    }

    #[test]
    fn test_guard_after_good_chunk_keeps_output() {
        let mut data = frame_chunks(&[(b"good", 4)]);
        data.extend_from_slice(&(-5i32).to_le_bytes());
        data.extend_from_slice(&4i32.to_le_bytes());

        let resource = framed_resource(data, CodecKind::Stored);
        assert_eq!(
            FramedChunks::new(CodecKind::Stored).open(&resource).drain(),
            b"good"
        );
    }

    #[test]
    fn test_padding_follows_absolute_offsets() {
        // A 2-byte prefix shifts the stream; padding is computed on source offsets
        let mut source = vec![0xEE, 0xEE];
        // 2 + 8 + 4 = 14 -> 2 padding bytes
        source.extend_from_slice(&ChunkFrameHeader::new(4, 4).unwrap().to_bytes().unwrap());
        source.extend_from_slice(b"abcd");
        source.extend_from_slice(&[0, 0]);
        source.extend_from_slice(&ChunkFrameHeader::new(2, 2).unwrap().to_bytes().unwrap());
        source.extend_from_slice(b"ef");
        let length = source.len() as u64 - 2;

        let resource = Resource::new(MemorySource::shared(source), 2, length);
        let mut stream = FramedChunks::new(CodecKind::Stored).open(&resource);
        assert_eq!(stream.drain(), b"abcdef");
        assert!(stream.fault().is_none());
    }

    #[test]
    fn test_layered_frames_decode() {
        let stream = frame_chunks(&[(b"hello", 5), (b"world!!!", 8)]);
        let resource = framed_resource(stream.clone(), CodecKind::Stored);
        let inner = Raw.decoder(&resource).unwrap();
        let mut decoder =
            FramedDecoder::layered(&resource, inner, CodecKind::Stored, TransformConfig::default());

        let mut out = Vec::new();
        while let Some(byte) = decoder.pull().unwrap() {
            out.push(byte);
        }
        assert_eq!(out, b"helloworld!!!");
        assert_eq!(decoder.consumed(), stream.len() as u64);
        assert_eq!(decoder.chunks(), 2);
    }

    #[test]
    fn test_layered_padding_follows_resource_offset() {
        let mut source = vec![0xEE, 0xEE];
        source.extend_from_slice(&ChunkFrameHeader::new(4, 4).unwrap().to_bytes().unwrap());
        source.extend_from_slice(b"abcd");
        source.extend_from_slice(&[0, 0]);
        source.extend_from_slice(&ChunkFrameHeader::new(2, 2).unwrap().to_bytes().unwrap());
        source.extend_from_slice(b"ef");
        let length = source.len() as u64 - 2;

        let resource = Resource::new(MemorySource::shared(source), 2, length);
        let inner = Raw.decoder(&resource).unwrap();
        let decoder = FramedChunks::new(CodecKind::Stored)
            .layered_decoder(&resource, inner)
            .unwrap();
        let mut stream = Stream::open("framed-chunks", decoder);
        assert_eq!(stream.drain(), b"abcdef");
        assert!(stream.fault().is_none());
    }

    #[test]
    fn test_layered_input_ending_early_stops_cleanly() {
        // The inner output stops partway through the second payload
        let stream = frame_chunks(&[(b"good", 4), (b"cut off", 7)]);
        let short = stream[..stream.len() - 3].to_vec();
        let resource = framed_resource(stream, CodecKind::Stored);
        let inner = Raw.decoder(&Resource::from_bytes(short)).unwrap();
        let decoder = FramedChunks::new(CodecKind::Stored)
            .layered_decoder(&resource, inner)
            .unwrap();
        let mut stream = Stream::open("framed-chunks", decoder);
        assert_eq!(stream.drain(), b"good");
        assert!(stream.fault().is_none());
    }

    #[test]
    fn test_pack_aligns_to_base() {
        let config = TransformConfig::default()
            .with_pack_chunk_size(3)
            .with_alignment_base(2);
        let mut sink = Vec::new();
        FramedChunks::with_config(CodecKind::Stored, config)
            .pack(&Resource::from_bytes(&b"abcde"[..]), &mut sink)
            .unwrap();

        // base 2 + 8 + 3 = 13 -> 3 padding; 16 + 8 + 2 = 26 -> 2 padding
        assert_eq!(sink.len(), 8 + 3 + 3 + 8 + 2 + 2);
        assert_eq!(&sink[11..14], &[0, 0, 0]);
    }
}
