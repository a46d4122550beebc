//! Fixture builders shared by unit tests

use std::sync::Arc;

use crate::chunked::{ChunkFrameHeader, FramedChunks, padding_for};
use crate::codec::CodecKind;
use crate::resource::Resource;
use crate::source::MemorySource;

/// Build a stored chunk stream by hand: one `(payload, declared decoded
/// length)` pair per chunk, padded relative to the stream start.
#[allow(clippy::expect_used)]
pub fn frame_chunks(chunks: &[(&[u8], usize)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (payload, decoded) in chunks {
        let header = ChunkFrameHeader::new(payload.len(), *decoded).expect("header fits");
        out.extend_from_slice(&header.to_bytes().expect("header serializes"));
        out.extend_from_slice(payload);
        let padding = padding_for(out.len() as u64) as usize;
        out.resize(out.len() + padding, 0);
    }
    out
}

/// Resource over `data` decoded as a chunk stream of `codec` payloads.
pub fn framed_resource(data: Vec<u8>, codec: CodecKind) -> Resource {
    let length = data.len() as u64;
    Resource::new(MemorySource::shared(data), 0, length)
        .with_transform(Arc::new(FramedChunks::new(codec)))
}
