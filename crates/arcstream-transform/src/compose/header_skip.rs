//! Drop a fixed number of leading decoded bytes

use std::sync::Arc;
use tracing::trace;

use crate::encode::Encode;
use crate::error::TransformResult;
use crate::resource::Resource;
use crate::stream::Decode;
use crate::transform::Transform;

/// Skips the first `count` bytes of the inner transform's output
///
/// Packing is the inner transform's pack, unchanged.
#[derive(Debug, Clone)]
pub struct HeaderSkip {
    inner: Arc<dyn Transform>,
    count: u64,
}

impl HeaderSkip {
    /// Skip `count` bytes of `inner`'s output.
    pub fn new(inner: Arc<dyn Transform>, count: u64) -> Self {
        Self { inner, count }
    }

    /// Bytes skipped on open.
    pub const fn count(&self) -> u64 {
        self.count
    }

    fn skip(&self, mut decoder: Box<dyn Decode>) -> TransformResult<Box<dyn Decode>> {
        let mut skipped = 0;
        while skipped < self.count && decoder.pull()?.is_some() {
            skipped += 1;
        }
        trace!("Skipped {} header bytes of {}", skipped, self.inner.name());
        Ok(decoder)
    }
}

impl Transform for HeaderSkip {
    fn name(&self) -> &'static str {
        "header-skip"
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        self.skip(self.inner.decoder(resource)?)
    }

    fn layered_decoder(
        &self,
        resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        self.skip(self.inner.layered_decoder(resource, input)?)
    }

    fn encoder<'a>(
        &self,
        resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        self.inner.encoder(resource, downstream)
    }
}
