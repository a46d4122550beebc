//! Random-access byte sources and the buffered cursor sessions read through
//!
//! A [`ByteSource`] is the archive file (or an in-memory copy of it). It is
//! shared between any number of sessions, so it only offers positional
//! reads; each session owns a [`SourceCursor`] holding its own position and
//! read-ahead buffer.

use bytes::Bytes;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Positional read access to an archive's bytes
pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; zero means `offset` is at or past
    /// the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// `true` when the source holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory source
#[derive(Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap a byte buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Shared handle, ready to place in a [`Resource`](crate::Resource).
    pub fn shared(data: impl Into<Bytes>) -> Arc<dyn ByteSource> {
        Arc::new(Self::new(data))
    }

    /// The underlying bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("len", &self.data.len())
            .finish()
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.data.len() {
            return Ok(0);
        }
        let count = buf.len().min(self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        Ok(count)
    }
}

/// File-backed source; positional reads are serialized through a lock
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    /// Open a file for positional reads.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path,
            file: Mutex::new(file),
            len,
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Memory-mapped file source
pub struct MmapSource {
    path: PathBuf,
    map: Mmap,
}

impl MmapSource {
    /// Map a file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // The mapping is read-only; archives are not modified while open.
        #[allow(unsafe_code)]
        let map = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { path, map })
    }

    /// Path the source was mapped from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for MmapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapSource")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.map.len() {
            return Ok(0);
        }
        let count = buf.len().min(self.map.len() - start);
        buf[..count].copy_from_slice(&self.map[start..start + count]);
        Ok(count)
    }
}

/// Buffered, bounded cursor over a shared source
///
/// Positions are absolute source offsets. Reads stop at `limit`; a source
/// that ends before `limit` is reported as `UnexpectedEof`.
pub struct SourceCursor {
    source: Arc<dyn ByteSource>,
    position: u64,
    limit: u64,
    buffer: Vec<u8>,
    buffer_start: u64,
    buffer_len: usize,
}

impl SourceCursor {
    /// Cursor over `[start, start + length)` of `source`.
    pub fn new(source: Arc<dyn ByteSource>, start: u64, length: u64, buffer_size: usize) -> Self {
        Self {
            source,
            position: start,
            limit: start.saturating_add(length),
            buffer: vec![0; buffer_size.max(1)],
            buffer_start: 0,
            buffer_len: 0,
        }
    }

    /// Current absolute position.
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Absolute end of the readable region.
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Bytes left before the limit.
    pub const fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.position)
    }

    /// Move to an absolute position; the buffer is kept if it still covers it.
    pub fn seek_to(&mut self, position: u64) {
        self.position = position;
    }

    /// Skip `count` bytes forward.
    pub fn skip(&mut self, count: u64) {
        self.position = self.position.saturating_add(count);
    }

    /// Move the end of the readable region.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    /// Re-point the cursor at a new `[start, start + length)` region.
    pub fn rebind(&mut self, start: u64, length: u64) {
        self.position = start;
        self.limit = start.saturating_add(length);
    }

    fn buffered(&self) -> Option<usize> {
        let end = self.buffer_start + self.buffer_len as u64;
        if self.position >= self.buffer_start && self.position < end {
            Some((self.position - self.buffer_start) as usize)
        } else {
            None
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let wanted = self.remaining().min(self.buffer.len() as u64) as usize;
        let read = self.source.read_at(self.position, &mut self.buffer[..wanted])?;
        if read == 0 && wanted > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended at {} before region end {}",
                    self.position, self.limit
                ),
            ));
        }
        self.buffer_start = self.position;
        self.buffer_len = read;
        Ok(())
    }

    /// Read one byte; `None` at the limit.
    pub fn read_u8(&mut self) -> io::Result<Option<u8>> {
        if self.position >= self.limit {
            return Ok(None);
        }
        let index = match self.buffered() {
            Some(index) => index,
            None => {
                self.fill()?;
                0
            }
        };
        self.position += 1;
        Ok(Some(self.buffer[index]))
    }

    /// Read exactly `len` bytes into a new buffer.
    pub fn read_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0; len];
        self.read_exact(&mut data)?;
        Ok(data)
    }

    /// Read everything up to the limit.
    pub fn read_remaining(&mut self) -> io::Result<Vec<u8>> {
        let len = usize::try_from(self.remaining()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "region too large for memory")
        })?;
        self.read_vec(len)
    }
}

impl fmt::Debug for SourceCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCursor")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl Read for SourceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.limit {
            return Ok(0);
        }
        let index = match self.buffered() {
            Some(index) => index,
            None => {
                self.fill()?;
                0
            }
        };
        let count = buf.len().min(self.buffer_len - index);
        buf[..count].copy_from_slice(&self.buffer[index..index + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for SourceCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.limit.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of source")
        })?;
        self.position = target;
        Ok(target)
    }
}
