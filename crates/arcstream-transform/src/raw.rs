//! Stored resources: the region is the decoded form

use std::io::Read;

use crate::config::TransformConfig;
use crate::encode::Encode;
use crate::error::TransformResult;
use crate::resource::Resource;
use crate::source::SourceCursor;
use crate::stream::Decode;
use crate::transform::Transform;

/// Identity transform
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Transform for Raw {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        Ok(Box::new(RegionDecoder::open(
            resource,
            TransformConfig::default().effective_buffer_size(),
        )?))
    }

    fn layered_decoder(
        &self,
        _resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Ok(input)
    }

    fn encoder<'a>(
        &self,
        _resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        Ok(downstream)
    }
}

/// Reads a resource's stored bytes verbatim
#[derive(Debug)]
pub struct RegionDecoder {
    cursor: SourceCursor,
}

impl RegionDecoder {
    /// Validate the region and position a cursor at its start.
    pub fn open(resource: &Resource, buffer_size: usize) -> TransformResult<Self> {
        resource.validate_region()?;
        Ok(Self {
            cursor: SourceCursor::new(
                resource.source().clone(),
                resource.offset(),
                resource.length(),
                buffer_size,
            ),
        })
    }

    /// The underlying cursor, for decoders that need `Read`.
    pub fn into_cursor(self) -> SourceCursor {
        self.cursor
    }
}

impl Decode for RegionDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        Ok(self.cursor.read_u8()?)
    }

    fn pull_into(&mut self, buf: &mut [u8]) -> TransformResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let count = self.cursor.read(&mut buf[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        Ok(filled)
    }
}
