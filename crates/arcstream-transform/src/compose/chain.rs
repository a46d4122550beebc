//! Two transforms in sequence
//!
//! The second transform reads the first one's output. Neither knows about
//! the other: the first decodes the stored region as usual, the second is
//! built over it with [`Transform::layered_decoder`].

use std::sync::Arc;

use crate::encode::Encode;
use crate::error::TransformResult;
use crate::resource::Resource;
use crate::stream::Decode;
use crate::transform::Transform;

/// Decode with `first`, then `second`; encode in the reverse order
#[derive(Debug, Clone)]
pub struct Chain {
    first: Arc<dyn Transform>,
    second: Arc<dyn Transform>,
}

impl Chain {
    /// `second` decodes the output of `first`.
    pub fn new(first: Arc<dyn Transform>, second: Arc<dyn Transform>) -> Self {
        Self { first, second }
    }
}

impl Transform for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn decoder(&self, resource: &Resource) -> TransformResult<Box<dyn Decode>> {
        let first = self.first.decoder(resource)?;
        self.second.layered_decoder(resource, first)
    }

    fn layered_decoder(
        &self,
        resource: &Resource,
        input: Box<dyn Decode>,
    ) -> TransformResult<Box<dyn Decode>> {
        let first = self.first.layered_decoder(resource, input)?;
        self.second.layered_decoder(resource, first)
    }

    // Bytes written pass through `second`'s encoder, then `first`'s.
    fn encoder<'a>(
        &self,
        resource: &Resource,
        downstream: Box<dyn Encode + 'a>,
    ) -> TransformResult<Box<dyn Encode + 'a>> {
        let first = self.first.encoder(resource, downstream)?;
        self.second.encoder(resource, first)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chunked::{FramedChunks, SegmentedChunks};
    use crate::cipher::CipherTransform;
    use crate::codec::{CodecKind, CodecTransform};
    use crate::config::TransformConfig;
    use crate::transform::decode_all;
    use arcstream_crypto::CipherSpec;
    use pretty_assertions::assert_eq;

    const TEXT: &[u8] = b"chained payload, chained payload, chained payload";

    fn cipher_then_zlib() -> Arc<Chain> {
        Arc::new(Chain::new(
            Arc::new(CipherTransform::new(CipherSpec::Rotate { initial: 99 })),
            Arc::new(CodecTransform::new(CodecKind::Zlib)),
        ))
    }

    #[test]
    fn test_cipher_then_codec_round_trip() {
        let chain = cipher_then_zlib();
        let mut packed = Vec::new();
        chain
            .pack(&Resource::from_bytes(TEXT.to_vec()), &mut packed)
            .unwrap();

        let resource = Resource::from_bytes(packed).with_transform(chain);
        assert_eq!(decode_all(&resource).unwrap(), TEXT);
    }

    #[test]
    fn test_packed_bytes_are_ciphered_codec_output() {
        let chain = cipher_then_zlib();
        let mut packed = Vec::new();
        chain
            .pack(&Resource::from_bytes(TEXT.to_vec()), &mut packed)
            .unwrap();

        // Undo the cipher alone: what remains must be a zlib stream
        let deciphered = Resource::from_bytes(packed).with_transform(Arc::new(
            CipherTransform::new(CipherSpec::Rotate { initial: 99 }),
        ));
        let zlib = decode_all(&deciphered).unwrap();
        assert_eq!(zlib[0], 0x78);
    }

    #[test]
    fn test_cipher_then_framed_chunks_round_trip() {
        let config = TransformConfig::default().with_pack_chunk_size(7);
        let chain = Arc::new(Chain::new(
            Arc::new(CipherTransform::new(CipherSpec::Xor { key: vec![1] })),
            Arc::new(FramedChunks::with_config(CodecKind::Zlib, config)),
        ));
        let mut packed = Vec::new();
        chain
            .pack(&Resource::from_bytes(TEXT.to_vec()), &mut packed)
            .unwrap();

        let resource = Resource::from_bytes(packed).with_transform(chain);
        assert_eq!(decode_all(&resource).unwrap(), TEXT);
    }

    #[test]
    fn test_segmented_second_cannot_layer() {
        let chain = Chain::new(
            Arc::new(CipherTransform::new(CipherSpec::Xor { key: vec![1] })),
            Arc::new(SegmentedChunks::new(CodecKind::Stored)),
        );
        let resource = Resource::from_bytes(&b"whatever"[..]);
        let mut stream = chain.open(&resource);
        assert!(!stream.available());
        assert!(stream.fault().is_some());
    }
}
