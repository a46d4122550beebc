//! The transform capability
//!
//! A transform is immutable configuration. Every [`Transform::open`] starts
//! an independent [`Stream`] session, so one `Arc<dyn Transform>` can serve
//! many resources on many threads at once.

use std::fmt;
use std::io::{Read, Write};

use tracing::debug;

use crate::encode::{CountingWriter, Encode, SinkEncoder};
use crate::error::{TransformError, TransformResult};
use crate::resource::Resource;
use crate::stream::{Decode, Stream};

/// A reversible (or decode-only) byte transform
pub trait Transform: Send + Sync + fmt::Debug {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Build a decoder over the resource's stored region.
    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>>;

    /// Build a decoder over another decoder's output instead of the stored
    /// region. Used by [`Chain`](crate::compose::Chain).
    fn layered_decoder(
        &self,
        _resource: &Resource,
        _input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Err(TransformError::InvalidResource(format!(
            "{} cannot read another transform's output",
            self.name()
        )))
    }

    /// Stack this transform's forward direction in front of `downstream`.
    ///
    /// Returns [`TransformError::Unsupported`] for decode-only transforms.
    fn encoder<'a>(
        &self,
        _resource: &Resource,
        _downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        Err(TransformError::Unsupported {
            transform: self.name(),
        })
    }

    /// Start a decode session. Setup failures yield an exhausted session
    /// carrying the fault.
    fn open(&self, resource: &Resource) -> Stream {
        match self.decoder(resource) {
            Ok(decoder) => Stream::open(self.name(), decoder),
            Err(fault) => Stream::failed(self.name(), fault),
        }
    }

    /// Decode `resource` with its own transform and re-encode it with this
    /// one into `sink`. Returns the number of bytes written.
    ///
    /// Decode-only transforms return [`TransformError::Unsupported`] before
    /// touching the sink.
    fn pack(&self, resource: &Resource, sink: &mut dyn Write) -> TransformResult<u64> {
        let mut counter = CountingWriter::new(sink);
        {
            let encoder = self.encoder(resource, Box::new(SinkEncoder::new(&mut counter)))?;
            pump(resource, encoder)?;
        }
        debug!(
            "Packed {} bytes with {} from {:?}",
            counter.written(),
            self.name(),
            resource
        );
        Ok(counter.written())
    }
}

/// Stream the decoded form of `resource` through `encoder` and finish it.
fn pump(resource: &Resource, mut encoder: Box<dyn Encode + '_>) -> TransformResult<()> {
    let mut stream = resource.transform().open(resource);
    let mut buf = vec![0u8; 8192];
    loop {
        let count = match Read::read(&mut stream, &mut buf) {
            Ok(count) => count,
            Err(e) => return Err(stream.take_fault().unwrap_or(TransformError::Io(e))),
        };
        if count == 0 {
            break;
        }
        encoder
            .write_all(&buf[..count])
            .map_err(TransformError::from_io)?;
    }
    encoder.finish()
}

/// Pack with `transform`, or copy the decoded form verbatim when the
/// transform has no forward direction.
pub fn pack_or_copy(
    transform: &dyn Transform,
    resource: &Resource,
    sink: &mut dyn Write,
) -> TransformResult<u64> {
    match transform.pack(resource, sink) {
        Err(e) if e.is_unsupported() => {
            debug!(
                "{} cannot pack, copying decoded bytes instead",
                transform.name()
            );
            let mut counter = CountingWriter::new(sink);
            pump(resource, Box::new(SinkEncoder::new(&mut counter)))?;
            Ok(counter.written())
        }
        other => other,
    }
}

/// Decode a resource with its own transform into memory.
///
/// Unlike the session API, a decode fault is returned as an error.
pub fn decode_all(resource: &Resource) -> TransformResult<Vec<u8>> {
    let mut stream = resource.transform().open(resource);
    let data = stream.drain();
    match stream.take_fault() {
        Some(fault) => Err(fault),
        None => Ok(data),
    }
}
