//! Forward (pack) direction
//!
//! Encoders are `Write` adapters stacked in front of a destination sink.
//! Each one owns the encoder below it; `finish` flushes its own trailing
//! state, then finishes the one below, so the whole stack is finalized by
//! finishing the outermost encoder.

use std::io::{self, Write};

use crate::error::{TransformError, TransformResult};

/// A `Write` stage that must be finalized
pub trait Encode: Write {
    /// Flush trailing state and finalize every stage below this one.
    fn finish(self: Box<Self>) -> TransformResult<()>;
}

/// Terminal stage writing into the destination sink
pub struct SinkEncoder<'a> {
    sink: &'a mut dyn Write,
}

impl<'a> SinkEncoder<'a> {
    /// Wrap a destination sink.
    pub fn new(sink: &'a mut dyn Write) -> Self {
        Self { sink }
    }
}

impl Write for SinkEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl Encode for SinkEncoder<'_> {
    fn finish(mut self: Box<Self>) -> TransformResult<()> {
        self.sink.flush()?;
        Ok(())
    }
}

/// Counts bytes written through it
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.inner.write(buf)?;
        self.written += count as u64;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Checks that the input opens with `expected`, then passes the rest through
///
/// Input that diverges from the expected prefix, or ends inside it, is
/// rejected with [`TransformError::InvalidResource`].
pub struct StripPrefix<'a> {
    expected: Vec<u8>,
    matched: usize,
    downstream: Box<dyn Encode + 'a>,
}

impl<'a> StripPrefix<'a> {
    /// Strip `expected` from the front of the input before `downstream`.
    pub fn new(expected: impl Into<Vec<u8>>, downstream: Box<dyn Encode + 'a>) -> Self {
        Self {
            expected: expected.into(),
            matched: 0,
            downstream,
        }
    }

    fn mismatch(&self) -> TransformError {
        TransformError::InvalidResource(format!(
            "input does not start with the {}-byte header {}",
            self.expected.len(),
            hex::encode(&self.expected)
        ))
    }
}

impl Write for StripPrefix<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let wanted = &self.expected[self.matched..];
        let compared = wanted.len().min(buf.len());
        if buf[..compared] != wanted[..compared] {
            return Err(io::Error::other(self.mismatch()));
        }
        self.matched += compared;
        if compared < buf.len() {
            self.downstream.write_all(&buf[compared..])?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.downstream.flush()
    }
}

impl Encode for StripPrefix<'_> {
    fn finish(self: Box<Self>) -> TransformResult<()> {
        if self.matched < self.expected.len() {
            return Err(self.mismatch());
        }
        self.downstream.finish()
    }
}
