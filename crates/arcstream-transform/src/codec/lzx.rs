//! LZX frame reader
//!
//! Each compressed block carries a big-endian header. A leading `0xFF`
//! marks a 5-byte header with an explicit frame size:
//!
//! ```text
//! 0xFF | frame_size: u16 BE | block_size: u16 BE | block bytes
//! ```
//!
//! otherwise the header is two bytes and the frame size is the default
//! 32 KB:
//!
//! ```text
//! block_size: u16 BE | block bytes
//! ```
//!
//! A zero frame or block size ends the stream.

use lzxd::{Lzxd, WindowSize};
use tracing::trace;

use crate::error::{TransformError, TransformResult};

/// Decoded bytes per frame when the header does not say otherwise
pub const DEFAULT_FRAME_SIZE: usize = 0x8000;

const CODEC: &str = "lzx";

/// Map a window size in bytes onto the decoder's window sizes.
pub fn window_size(bytes: u32) -> TransformResult<WindowSize> {
    Ok(match bytes {
        0x8000 => WindowSize::KB32,
        0x1_0000 => WindowSize::KB64,
        0x2_0000 => WindowSize::KB128,
        0x4_0000 => WindowSize::KB256,
        0x8_0000 => WindowSize::KB512,
        0x10_0000 => WindowSize::MB1,
        0x20_0000 => WindowSize::MB2,
        0x40_0000 => WindowSize::MB4,
        0x80_0000 => WindowSize::MB8,
        0x100_0000 => WindowSize::MB16,
        0x200_0000 => WindowSize::MB32,
        other => {
            return Err(TransformError::codec(
                CODEC,
                format!("unsupported window size {other}"),
            ));
        }
    })
}

/// Frame-at-a-time LZX decoder
pub struct LzxFrames {
    decoder: Lzxd,
    input: Vec<u8>,
    position: usize,
    frame: Vec<u8>,
    frame_position: usize,
    finished: bool,
}

impl LzxFrames {
    /// Prepare to decode `input` with a window of `window` bytes.
    pub fn new(input: Vec<u8>, window: u32) -> TransformResult<Self> {
        Ok(Self {
            decoder: Lzxd::new(window_size(window)?),
            input,
            position: 0,
            frame: Vec::new(),
            frame_position: 0,
            finished: false,
        })
    }

    fn truncated(&self, what: &str) -> TransformError {
        TransformError::codec(
            CODEC,
            format!("truncated {what} at input offset {}", self.position),
        )
    }

    fn next_frame(&mut self) -> TransformResult<bool> {
        if self.finished {
            return Ok(false);
        }
        let rest = &self.input[self.position..];
        if rest.is_empty() {
            self.finished = true;
            return Ok(false);
        }

        let (header_len, frame_size, block_size) = if rest[0] == 0xFF {
            if rest.len() < 5 {
                return Err(self.truncated("frame header"));
            }
            (
                5,
                usize::from(u16::from_be_bytes([rest[1], rest[2]])),
                usize::from(u16::from_be_bytes([rest[3], rest[4]])),
            )
        } else {
            if rest.len() < 2 {
                return Err(self.truncated("frame header"));
            }
            (
                2,
                DEFAULT_FRAME_SIZE,
                usize::from(u16::from_be_bytes([rest[0], rest[1]])),
            )
        };

        if frame_size == 0 || block_size == 0 {
            self.finished = true;
            return Ok(false);
        }

        let start = self.position + header_len;
        let end = start + block_size;
        if end > self.input.len() {
            return Err(self.truncated("block"));
        }

        trace!(
            "LZX frame at {}: {} compressed -> {} bytes",
            self.position, block_size, frame_size
        );

        let decoded = self
            .decoder
            .decompress_next(&self.input[start..end], frame_size)
            .map_err(|e| TransformError::codec(CODEC, format!("{e:?}")))?;
        self.frame.clear();
        self.frame.extend_from_slice(decoded);
        self.frame_position = 0;
        self.position = end;
        Ok(true)
    }

    /// Next decoded byte; `None` after the terminating frame.
    pub fn pull(&mut self) -> TransformResult<Option<u8>> {
        loop {
            if let Some(byte) = self.frame.get(self.frame_position) {
                self.frame_position += 1;
                return Ok(Some(*byte));
            }
            if !self.next_frame()? {
                return Ok(None);
            }
        }
    }
}
