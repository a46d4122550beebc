//! Keyed cipher streams
//!
//! A fresh keystream is built from the [`CipherSpec`] for every session and
//! every pack, so the register always starts from its configured initial
//! value. Decoding and encoding are the same operation.

use arcstream_crypto::{CipherSpec, Keystream};
use std::io::{self, Write};

use crate::config::TransformConfig;
use crate::encode::Encode;
use crate::error::TransformResult;
use crate::raw::RegionDecoder;
use crate::resource::Resource;
use crate::stream::Decode;
use crate::transform::Transform;

/// Applies a keystream over the stored bytes
#[derive(Debug, Clone)]
pub struct CipherTransform {
    spec: CipherSpec,
    config: TransformConfig,
}

impl CipherTransform {
    /// Cipher transform with default configuration.
    pub fn new(spec: CipherSpec) -> Self {
        Self::with_config(spec, TransformConfig::default())
    }

    /// Cipher transform with explicit configuration.
    pub fn with_config(spec: CipherSpec, config: TransformConfig) -> Self {
        Self { spec, config }
    }

    /// The cipher description.
    pub fn spec(&self) -> &CipherSpec {
        &self.spec
    }
}

impl Transform for CipherTransform {
    fn name(&self) -> &'static str {
        self.spec.family()
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        let region = RegionDecoder::open(resource, self.config.effective_buffer_size())?;
        self.layered_decoder(resource, Box::new(region))
    }

    fn layered_decoder(
        &self,
        _resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        Ok(Box::new(CipherDecoder {
            input,
            keystream: self.spec.build()?,
        }))
    }

    fn encoder<'a>(
        &self,
        _resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        Ok(Box::new(CipherEncoder {
            keystream: self.spec.build()?,
            scratch: Vec::new(),
            downstream,
        }))
    }
}

struct CipherDecoder {
    input: Box<dyn Decode>,
    keystream: Box<dyn Keystream>,
}

impl Decode for CipherDecoder {
    fn pull(&mut self) -> TransformResult<Option<u8>> {
        Ok(self
            .input
            .pull()?
            .map(|byte| self.keystream.apply_byte(byte)))
    }

    fn pull_into(&mut self, buf: &mut [u8]) -> TransformResult<usize> {
        let count = self.input.pull_into(buf)?;
        self.keystream.apply(&mut buf[..count]);
        Ok(count)
    }
}

struct CipherEncoder<'a> {
    keystream: Box<dyn Keystream>,
    scratch: Vec<u8>,
    downstream: Box<dyn Encode + 'a>,
}

impl Write for CipherEncoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keystream.apply(&mut self.scratch);
        self.downstream.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.downstream.flush()
    }
}

impl Encode for CipherEncoder<'_> {
    fn finish(self: Box<Self>) -> TransformResult<()> {
        self.downstream.finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transform::decode_all;
    use arcstream_crypto::RotateCipher;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn specs() -> Vec<CipherSpec> {
        vec![
            CipherSpec::Rotate {
                initial: 0x5A3C_96E1,
            },
            CipherSpec::RotateXor {
                initial: 7,
                constant: 0x9E37_79B9,
            },
            CipherSpec::Arc4 {
                key: b"archive".to_vec(),
            },
            CipherSpec::Xor {
                key: vec![0x13, 0x37],
            },
        ]
    }

    #[test]
    fn test_decode_matches_keystream() {
        let plain = b"cipher stream payload".to_vec();
        let mut encoded = plain.clone();
        RotateCipher::new(42).apply(&mut encoded);

        let resource = Resource::from_bytes(encoded).with_transform(Arc::new(CipherTransform::new(
            CipherSpec::Rotate { initial: 42 },
        )));
        assert_eq!(decode_all(&resource).unwrap(), plain);
    }

    #[test]
    fn test_pack_then_decode_every_family() {
        let plain: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for spec in specs() {
            let transform = Arc::new(CipherTransform::new(spec.clone()));
            let mut packed = Vec::new();
            transform
                .pack(&Resource::from_bytes(plain.clone()), &mut packed)
                .unwrap();
            assert_ne!(packed, plain, "{}", spec.family());

            let resource = Resource::from_bytes(packed).with_transform(transform);
            assert_eq!(decode_all(&resource).unwrap(), plain, "{}", spec.family());
        }
    }

    #[test]
    fn test_register_resets_each_session() {
        let resource = Resource::from_bytes(&b"same bytes"[..]).with_transform(Arc::new(
            CipherTransform::new(CipherSpec::RotateXor {
                initial: 1,
                constant: 3,
            }),
        ));
        let first = decode_all(&resource).unwrap();
        let second = decode_all(&resource).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bad_key_fails_setup() {
        let resource = Resource::from_bytes(&b"data"[..]);
        let mut stream = CipherTransform::new(CipherSpec::Arc4 { key: Vec::new() }).open(&resource);
        assert!(!stream.available());
        assert!(matches!(
            stream.fault(),
            Some(crate::error::TransformError::Crypto(_))
        ));
    }
}
