//! Prepend a synthetic header to another transform's output
//!
//! Some archives store entries with their file-format header stripped.
//! Injection puts a known header back so the decoded bytes form a valid file.
//! Packing expects the replacement to start with that same header and
//! stores only what follows it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::encode::{Encode, StripPrefix};
use crate::error::TransformResult;
use crate::resource::Resource;
use crate::stream::Decode;
use crate::transform::Transform;

/// Emits a header, then the inner transform's output
#[derive(Debug, Clone)]
pub struct HeaderInject {
    default: Vec<u8>,
    by_type: BTreeMap<String, Vec<u8>>,
    inner: Arc<dyn Transform>,
}

impl HeaderInject {
    /// Inject `header` ahead of `inner`'s output.
    pub fn new(header: impl Into<Vec<u8>>, inner: Arc<dyn Transform>) -> Self {
        Self {
            default: header.into(),
            by_type: BTreeMap::new(),
            inner,
        }
    }

    /// Use `header` for resources whose type hint is `type_hint`.
    #[must_use]
    pub fn with_type_header(mut self, type_hint: &str, header: impl Into<Vec<u8>>) -> Self {
        self.by_type.insert(normalize(type_hint), header.into());
        self
    }

    /// Header injected for `resource`.
    pub fn header_for(&self, resource: &Resource) -> &[u8] {
        resource
            .type_hint()
            .and_then(|hint| self.by_type.get(&normalize(hint)))
            .unwrap_or(&self.default)
    }

    fn wrap(&self, resource: &Resource, inner: Box<dyn Decode>) -> Box<dyn Decode> {
        Box::new(InjectDecoder {
            header: self.header_for(resource).to_vec(),
            position: 0,
            inner,
        })
    }
}

fn normalize(type_hint: &str) -> String {
    type_hint.trim_start_matches('.').to_ascii_lowercase()
}

impl Transform for HeaderInject {
    fn name(&self) -> &'static str {
        "header-inject"
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        Ok(self.wrap(resource, self.inner.decoder(resource)?))
    }

    fn layered_decoder(
        &self,
        resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Ok(self.wrap(resource, self.inner.layered_decoder(resource, input)?))
    }

    fn encoder<'a>(
        &self,
        resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        let inner = self.inner.encoder(resource, downstream)?;
        Ok(Box::new(StripPrefix::new(self.header_for(resource), inner)))
    }
}

struct InjectDecoder {
    header: Vec<u8>,
    position: usize,
    inner: Box<dyn Decode>,
}

impl Decode for InjectDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        if let Some(byte) = self.header.get(self.position) {
            self.position += 1;
            return Ok(Some(*byte));
        }
        self.inner.pull()
    }

    fn pull_into(&mut self, buf: &mut [u8]) -> TransformResult<usize> {
        let rest = &self.header[self.position.min(self.header.len())..];
        let count = rest.len().min(buf.len());
        buf[..count].copy_from_slice(&rest[..count]);
        self.position += count;
        if count == buf.len() {
            return Ok(count);
        }
        Ok(count + self.inner.pull_into(&mut buf[count..])?)
    }
}
