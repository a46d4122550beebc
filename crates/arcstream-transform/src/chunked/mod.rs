//! Chunked stream decoders
//!
//! Two layouts: [`FramedChunks`] carries its framing inline with the data,
//! [`SegmentedChunks`] takes chunk boundaries from the resource's segment
//! table.

mod framed;
mod segmented;

pub use framed::{
    ChunkFrameHeader, FRAME_HEADER_SIZE, FramedChunks, FramedDecoder, FramedEncoder, padding_for,
};
pub use segmented::{SegmentedChunks, SegmentedDecoder};
