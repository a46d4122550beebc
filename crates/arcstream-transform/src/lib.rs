//! Streaming byte transforms for archive entries
//!
#![allow(clippy::cast_possible_wrap)] // Length fields are signed on the wire
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! Archive entries are rarely stored as plain bytes. They are compressed,
//! split into chunks, obscured with a keystream, stripped of their file
//! header, or some combination. This crate turns a [`Resource`] (where the
//! bytes live) plus a [`Transform`] (how they were stored) into a pull-driven
//! [`Stream`] of decoded bytes, and re-encodes replacement data the same way.
//!
//! # Transforms
//!
//! - [`Raw`]: stored bytes
//! - [`CodecTransform`]: deflate, zlib, LZ4, explode, LZX, zstd
//! - [`FramedChunks`]: self-describing chunk streams
//! - [`SegmentedChunks`]: chunks listed in a segment table, optionally with
//!   spacer records
//! - [`CipherTransform`]: keystream ciphers from `arcstream-crypto`
//! - [`HeaderSkip`], [`HeaderInject`], [`Chain`], [`EscapeDecode`]:
//!   composition
//!
//! # Sessions
//!
//! A transform holds only configuration. Each [`Transform::open`] returns an
//! independent [`Stream`]:
//!
//! ```
//! use std::sync::Arc;
//! use arcstream_transform::{CodecKind, FramedChunks, Resource, Transform};
//!
//! let transform = Arc::new(FramedChunks::new(CodecKind::Zlib));
//! let mut packed = Vec::new();
//! transform.pack(&Resource::from_bytes(&b"hello chunks"[..]), &mut packed).unwrap();
//!
//! let resource = Resource::from_bytes(packed).with_transform(transform.clone());
//! let mut stream = transform.open(&resource);
//! let mut out = Vec::new();
//! while stream.available() {
//!     out.push(stream.read());
//! }
//! assert_eq!(out, b"hello chunks");
//! ```
//!
//! Decode faults never escape `available`/`read`: the stream ends, the fault
//! is logged once and kept on [`Stream::fault`].

#![warn(missing_docs)]

pub mod chunked;
pub mod cipher;
pub mod codec;
pub mod compose;
pub mod config;
pub mod encode;
pub mod error;
pub mod raw;
pub mod resource;
pub mod source;
pub mod spec;
pub mod stream;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_utils;

pub use chunked::{FramedChunks, SegmentedChunks};
pub use cipher::CipherTransform;
pub use codec::{CodecKind, CodecTransform};
pub use compose::{Chain, EscapeDecode, HeaderInject, HeaderSkip};
pub use config::TransformConfig;
pub use encode::Encode;
pub use error::{TransformError, TransformResult};
pub use raw::Raw;
pub use resource::{Resource, Segment, SegmentTable};
pub use source::{ByteSource, FileSource, MemorySource, MmapSource};
pub use spec::TransformSpec;
pub use stream::{Decode, SessionState, Stream, StreamEnd};
pub use transform::{Transform, decode_all, pack_or_copy};

pub use arcstream_crypto::CipherSpec;
