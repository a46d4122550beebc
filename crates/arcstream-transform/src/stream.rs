//! The uniform pull contract
//!
//! Every transform produces a boxed [`Decode`] for each session. Callers
//! never see a `Decode` directly: [`Transform::open`](crate::Transform::open)
//! wraps it in a [`Stream`], which owns the session state machine and turns
//! faults into end of stream.
//!
//! ```text
//! Closed --open--> Opened --prime--> Streaming --available()==false--> Exhausted
//!    ^                                                                      |
//!    +------------------------------- close() -----------------------------+
//! ```
//!
//! `available()` may advance the decoder: it pulls one byte into a
//! look-ahead slot. `read()` does not depend on it and pulls on demand.

use std::fmt;
use std::io::{self, Read};
use tracing::{debug, warn};

use crate::error::{TransformError, TransformResult};

/// A source of decoded bytes for one session
pub trait Decode: Send {
    /// Pull the next decoded byte. `Ok(None)` is a clean end of stream.
    fn pull(&mut self) -> TransformResult<Option<u8>>;

    /// Pull up to `buf.len()` bytes. Returns 0 only at a clean end.
    ///
    /// Bytes placed in `buf` before a fault are lost with the error.
    fn pull_into(&mut self, buf: &mut [u8]) -> TransformResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.pull()? {
                Some(byte) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                None => break,
            }
        }
        Ok(filled)
    }
}

impl Decode for Box<dyn Decode> {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        (**self).pull()
    }

    fn pull_into(&mut self, buf: &mut [u8]) -> TransformResult<usize> {
        (**self).pull_into(buf)
    }
}

/// Lifecycle of a [`Stream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No decoder attached
    Closed,
    /// Decoder attached, nothing primed yet
    Opened,
    /// A byte is ready or may be pulled
    Streaming,
    /// No more bytes; see [`Stream::fault`] for why
    Exhausted,
}

/// How an exhausted stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The decoder ran out of input normally
    Clean,
    /// The decoder failed; partial output was kept
    Fault,
}

/// An open decode session
pub struct Stream {
    transform: &'static str,
    decoder: Option<Box<dyn Decode>>,
    state: SessionState,
    lookahead: Option<u8>,
    fault: Option<TransformError>,
    bytes_read: u64,
}

impl Stream {
    /// Start a session over `decoder` and prime the first byte.
    pub fn open(transform: &'static str, decoder: Box<dyn Decode>) -> Self {
        debug!("Opened {} session", transform);
        let mut stream = Self {
            transform,
            decoder: Some(decoder),
            state: SessionState::Opened,
            lookahead: None,
            fault: None,
            bytes_read: 0,
        };
        stream.prime();
        stream
    }

    /// A session whose setup failed: exhausted from the start.
    pub fn failed(transform: &'static str, fault: TransformError) -> Self {
        warn!("{} session setup failed: {}", transform, fault);
        Self {
            transform,
            decoder: None,
            state: SessionState::Exhausted,
            lookahead: None,
            fault: Some(fault),
            bytes_read: 0,
        }
    }

    /// Name of the transform that opened this session.
    pub const fn transform(&self) -> &'static str {
        self.transform
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Fault that ended the stream, if any.
    pub const fn fault(&self) -> Option<&TransformError> {
        self.fault.as_ref()
    }

    /// Take ownership of the recorded fault.
    pub fn take_fault(&mut self) -> Option<TransformError> {
        self.fault.take()
    }

    /// How the stream ended, once exhausted.
    pub const fn end(&self) -> Option<StreamEnd> {
        match (self.state, &self.fault) {
            (SessionState::Exhausted, None) => Some(StreamEnd::Clean),
            (SessionState::Exhausted, Some(_)) => Some(StreamEnd::Fault),
            _ => None,
        }
    }

    /// Bytes handed out by `read` and the `Read` impl so far.
    pub const fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    fn prime(&mut self) {
        if self.state == SessionState::Opened {
            self.state = SessionState::Streaming;
            self.fill_lookahead();
        }
    }

    fn record_fault(&mut self, fault: TransformError) {
        warn!(
            "{} stream ended on fault after {} bytes: {}",
            self.transform, self.bytes_read, fault
        );
        self.fault = Some(fault);
        self.state = SessionState::Exhausted;
        self.decoder = None;
    }

    fn fill_lookahead(&mut self) -> bool {
        if self.lookahead.is_some() {
            return true;
        }
        if self.state != SessionState::Streaming {
            return false;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            self.state = SessionState::Exhausted;
            return false;
        };
        match decoder.pull() {
            Ok(Some(byte)) => {
                self.lookahead = Some(byte);
                true
            }
            Ok(None) => {
                debug!(
                    "{} stream exhausted after {} bytes",
                    self.transform, self.bytes_read
                );
                self.state = SessionState::Exhausted;
                self.decoder = None;
                false
            }
            Err(fault) => {
                self.record_fault(fault);
                false
            }
        }
    }

    /// Whether the next [`read`](Self::read) yields real data.
    ///
    /// May pull one byte from the decoder into the look-ahead slot.
    pub fn available(&mut self) -> bool {
        self.fill_lookahead()
    }

    /// Next decoded byte, or `0` past the end of the stream.
    pub fn read(&mut self) -> u8 {
        if !self.fill_lookahead() {
            return 0;
        }
        match self.lookahead.take() {
            Some(byte) => {
                self.bytes_read += 1;
                byte
            }
            None => 0,
        }
    }

    /// Release the decoder. Valid in any state.
    pub fn close(&mut self) {
        self.decoder = None;
        self.lookahead = None;
        self.state = SessionState::Closed;
    }

    /// Drain the rest of the stream. Partial output is kept on fault.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let count = self.pull_bulk(&mut buf);
            if count == 0 {
                break;
            }
            out.extend_from_slice(&buf[..count]);
        }
        out
    }

    fn pull_bulk(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let mut filled = 0;
        if let Some(byte) = self.lookahead.take() {
            buf[0] = byte;
            filled = 1;
        }
        // Byte-wise so that output produced before a fault is kept
        while filled < buf.len() && self.state == SessionState::Streaming {
            let Some(decoder) = self.decoder.as_mut() else {
                self.state = SessionState::Exhausted;
                break;
            };
            match decoder.pull() {
                Ok(Some(byte)) => {
                    buf[filled] = byte;
                    filled += 1;
                }
                Ok(None) => {
                    self.state = SessionState::Exhausted;
                    self.decoder = None;
                }
                Err(fault) => self.record_fault(fault),
            }
        }
        self.bytes_read += filled as u64;
        filled
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("transform", &self.transform)
            .field("state", &self.state)
            .field("bytes_read", &self.bytes_read)
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

/// Bulk reads. Unlike `read()`, a decode fault is reported as an error once
/// the bytes produced before it have been returned.
impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.pull_bulk(buf);
        if count == 0 {
            if let Some(fault) = self.fault.as_ref() {
                return Err(io::Error::other(fault.to_string()));
            }
        }
        Ok(count)
    }
}

/// Adapts a decoder into `std::io::Read`, so codec primitives can consume
/// another transform's output.
pub struct DecodeReader {
    inner: Box<dyn Decode>,
}

impl DecodeReader {
    /// Wrap a decoder.
    pub fn new(inner: Box<dyn Decode>) -> Self {
        Self { inner }
    }
}

impl Read for DecodeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.pull_into(buf).map_err(|e| match e {
            TransformError::Io(io) => io,
            other => io::Error::other(other),
        })
    }
}

/// Decoder over an in-memory buffer
#[derive(Debug)]
pub struct BufferDecoder {
    data: Vec<u8>,
    position: usize,
}

impl BufferDecoder {
    /// Emit `data` byte by byte.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl Decode for BufferDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        let byte = self.data.get(self.position).copied();
        if byte.is_some() {
            self.position += 1;
        }
        Ok(byte)
    }

    fn pull_into(&mut self, buf: &mut [u8]) -> TransformResult<usize> {
        let rest = &self.data[self.position..];
        let count = rest.len().min(buf.len());
        buf[..count].copy_from_slice(&rest[..count]);
        self.position += count;
        Ok(count)
    }
}
