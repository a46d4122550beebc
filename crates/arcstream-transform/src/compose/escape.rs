//! Escape-sequence decoding
//!
//! `=` followed by two hex digits encodes one byte. An escaped CR is a line
//! continuation: it is dropped together with the LF that follows it
//! (written as a `0A` pair, as `=0A`, or raw) and any spaces or tabs after
//! that. A raw soft break (`=` then CR/LF) is handled the same way.
//!
//! ```text
//! AB=0D0A CD  ->  ABCD
//! A=3DB       ->  A=B
//! ```

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::config::TransformConfig;
use crate::encode::Encode;
use crate::error::TransformResult;
use crate::raw::RegionDecoder;
use crate::resource::Resource;
use crate::stream::Decode;
use crate::transform::Transform;

/// The escape byte
pub const ESCAPE: u8 = b'=';

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Decodes `=XX` escapes in the stored bytes
#[derive(Debug, Clone, Default)]
pub struct EscapeDecode {
    config: TransformConfig,
}

impl EscapeDecode {
    /// Escape decoding with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Escape decoding with explicit configuration.
    pub fn with_config(config: TransformConfig) -> Self {
        Self { config }
    }
}

impl Transform for EscapeDecode {
    fn name(&self) -> &'static str {
        "escape"
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        let region = RegionDecoder::open(resource, self.config.effective_buffer_size())?;
        Ok(Box::new(EscapeDecoder::new(Box::new(region))))
    }

    fn layered_decoder(
        &self,
        _resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Ok(Box::new(EscapeDecoder::new(input)))
    }

    fn encoder<'a>(
        &self,
        _resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        Ok(Box::new(EscapeEncoder {
            scratch: Vec::new(),
            downstream,
        }))
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Escape decoder over any byte source
pub struct EscapeDecoder {
    input: Box<dyn Decode>,
    pending: VecDeque<u8>,
}

impl EscapeDecoder {
    /// Decode escapes in `input`'s output.
    pub fn new(input: Box<dyn Decode>) -> Self {
        Self {
            input,
            pending: VecDeque::new(),
        }
    }

    fn next_raw(&mut self) -> TransformResult<Option<u8>> {
        match self.pending.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None => self.input.pull(),
        }
    }

    /// Look `index` bytes ahead without consuming.
    fn peek(&mut self, index: usize) -> TransformResult<Option<u8>> {
        while self.pending.len() <= index {
            match self.input.pull()? {
                Some(byte) => self.pending.push_back(byte),
                None => return Ok(None),
            }
        }
        Ok(self.pending.get(index).copied())
    }

    fn consume(&mut self, count: usize) {
        self.pending.drain(..count.min(self.pending.len()));
    }

    fn is_lf_pair(high: Option<u8>, low: Option<u8>) -> bool {
        high == Some(b'0') && matches!(low, Some(b'A' | b'a'))
    }

    /// Drop the LF that completes a continuation, then any blanks.
    fn finish_continuation(&mut self) -> TransformResult<()> {
        if Self::is_lf_pair(self.peek(0)?, self.peek(1)?) {
            self.consume(2);
        } else if self.peek(0)? == Some(ESCAPE) && Self::is_lf_pair(self.peek(1)?, self.peek(2)?)
        {
            self.consume(3);
        } else if self.peek(0)? == Some(LF) {
            self.consume(1);
        }
        while matches!(self.peek(0)?, Some(b' ' | b'\t')) {
            self.consume(1);
        }
        Ok(())
    }

    /// Drop the rest of a raw soft break, then any blanks.
    fn finish_soft_break(&mut self, first: u8) -> TransformResult<()> {
        if first == CR && self.peek(0)? == Some(LF) {
            self.consume(1);
        }
        while matches!(self.peek(0)?, Some(b' ' | b'\t')) {
            self.consume(1);
        }
        Ok(())
    }
}

impl Decode for EscapeDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        loop {
            let Some(byte) = self.next_raw()? else {
                return Ok(None);
            };
            if byte != ESCAPE {
                return Ok(Some(byte));
            }

            let Some(high) = self.next_raw()? else {
                return Ok(Some(ESCAPE));
            };
            if high == CR || high == LF {
                self.finish_soft_break(high)?;
                continue;
            }

            let Some(low) = self.next_raw()? else {
                self.pending.push_front(high);
                return Ok(Some(ESCAPE));
            };
            match (hex_value(high), hex_value(low)) {
                (Some(h), Some(l)) => {
                    let value = (h << 4) | l;
                    if value == CR {
                        self.finish_continuation()?;
                        continue;
                    }
                    return Ok(Some(value));
                }
                _ => {
                    // Not an escape: emit '=' and re-read both bytes
                    self.pending.push_front(low);
                    self.pending.push_front(high);
                    return Ok(Some(ESCAPE));
                }
            }
        }
    }
}

/// Writes `=XX` for the escape byte and for bytes outside printable ASCII,
/// except CR, LF and TAB
struct EscapeEncoder<'a> {
    scratch: Vec<u8>,
    downstream: Box<dyn Encode + 'a>,
}

fn needs_escape(byte: u8) -> bool {
    match byte {
        ESCAPE => true,
        b'\t' | CR | LF => false,
        0x20..=0x7E => false,
        _ => true,
    }
}

impl Write for EscapeEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        self.scratch.clear();
        for &byte in buf {
            if needs_escape(byte) {
                self.scratch.extend_from_slice(&[
                    ESCAPE,
                    HEX[usize::from(byte >> 4)],
                    HEX[usize::from(byte & 0x0F)],
                ]);
            } else {
                self.scratch.push(byte);
            }
        }
        self.downstream.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.downstream.flush()
    }
}

impl Encode for EscapeEncoder<'_> {
    fn finish(self: Box<Self>) -> TransformResult<()> {
        self.downstream.finish()
    }
}
