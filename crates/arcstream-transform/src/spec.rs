//! Declarative transform descriptions
//!
//! Archive plugins describe how an entry is stored as JSON and build the
//! transform from it:
//!
//! ```
//! use arcstream_transform::{Transform, TransformConfig, TransformSpec};
//!
//! let spec = TransformSpec::from_json(
//!     r#"{
//!         "kind": "chain",
//!         "first": { "kind": "cipher", "cipher": { "family": "rotate", "initial": 7 } },
//!         "second": { "kind": "codec", "codec": "zlib" }
//!     }"#,
//! )
//! .unwrap();
//! let transform = spec.build(&TransformConfig::default()).unwrap();
//! assert_eq!(transform.name(), "chain");
//! ```

use arcstream_crypto::CipherSpec;
pub use arcstream_crypto::HexBytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chunked::{FramedChunks, SegmentedChunks};
use crate::cipher::CipherTransform;
use crate::codec::{CodecKind, CodecTransform};
use crate::compose::{Chain, EscapeDecode, HeaderInject, HeaderSkip};
use crate::config::TransformConfig;
use crate::error::TransformResult;
use crate::raw::Raw;
use crate::transform::Transform;

/// Serializable description of a transform tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformSpec {
    /// Stored bytes
    Raw,
    /// Whole region through one codec
    Codec {
        /// Codec applied
        codec: CodecKind,
    },
    /// Keystream over the stored bytes
    Cipher {
        /// Keystream family and parameters
        cipher: CipherSpec,
    },
    /// Self-describing chunk stream
    FramedChunks {
        /// Codec of every chunk payload
        codec: CodecKind,
    },
    /// Chunks listed in the resource's segment table
    Segmented {
        /// Codec of every chunk
        codec: CodecKind,
        /// Copy spacer records between chunks
        #[serde(default)]
        spacer: bool,
    },
    /// `=XX` escape decoding
    Escape,
    /// Drop leading bytes of the inner output
    HeaderSkip {
        /// Bytes dropped
        bytes: u64,
        /// Transform producing the output
        inner: Box<TransformSpec>,
    },
    /// Prepend a header to the inner output
    HeaderInject {
        /// Header used when no type-specific one matches
        header: HexBytes,
        /// Headers keyed by type hint
        #[serde(default)]
        by_type: BTreeMap<String, HexBytes>,
        /// Transform producing the output
        inner: Box<TransformSpec>,
    },
    /// `second` decodes the output of `first`
    Chain {
        /// Applied to the stored bytes
        first: Box<TransformSpec>,
        /// Applied to `first`'s output
        second: Box<TransformSpec>,
    },
}

impl TransformSpec {
    /// Parse a description from JSON.
    pub fn from_json(text: &str) -> TransformResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the transform tree; every node shares `config`.
    pub fn build(&self, config: &TransformConfig) -> TransformResult<Arc<dyn Transform>> {
        Ok(match self {
            Self::Raw => Arc::new(Raw),
            Self::Codec { codec } => Arc::new(CodecTransform::with_config(*codec, config.clone())),
            Self::Cipher { cipher } => {
                // Unusable keys fail at build time
                cipher.build()?;
                Arc::new(CipherTransform::with_config(cipher.clone(), config.clone()))
            }
            Self::FramedChunks { codec } => {
                Arc::new(FramedChunks::with_config(*codec, config.clone()))
            }
            Self::Segmented { codec, spacer } => {
                let transform = if *spacer {
                    SegmentedChunks::with_spacer(*codec)
                } else {
                    SegmentedChunks::new(*codec)
                };
                Arc::new(transform.with_config(config.clone()))
            }
            Self::Escape => Arc::new(EscapeDecode::with_config(config.clone())),
            Self::HeaderSkip { bytes, inner } => {
                Arc::new(HeaderSkip::new(inner.build(config)?, *bytes))
            }
            Self::HeaderInject {
                header,
                by_type,
                inner,
            } => {
                let inject = by_type.iter().fold(
                    HeaderInject::new(header.0.clone(), inner.build(config)?),
                    |inject, (hint, header)| inject.with_type_header(hint, header.0.clone()),
                );
                Arc::new(inject)
            }
            Self::Chain { first, second } => {
                Arc::new(Chain::new(first.build(config)?, second.build(config)?))
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::transform::decode_all;

    #[test]
    fn test_parse_nested() {
        let spec = TransformSpec::from_json(
            r#"{
                "kind": "header-skip",
                "bytes": 4,
                "inner": { "kind": "framed-chunks", "codec": "zlib" }
            }"#,
        )
        .unwrap();
        assert_eq!(
            spec,
            TransformSpec::HeaderSkip {
                bytes: 4,
                inner: Box::new(TransformSpec::FramedChunks {
                    codec: CodecKind::Zlib
                }),
            }
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let spec = TransformSpec::HeaderInject {
            header: HexBytes(b"RIFF".to_vec()),
            by_type: BTreeMap::from([("wav".to_string(), HexBytes(b"WAVE".to_vec()))]),
            inner: Box::new(TransformSpec::Segmented {
                codec: CodecKind::Stored,
                spacer: true,
            }),
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"52494646\""), "{json}");
        assert_eq!(TransformSpec::from_json(&json).unwrap(), spec);
    }

    #[test]
    fn test_build_and_decode() {
        let spec = TransformSpec::from_json(
            r#"{ "kind": "header-inject", "header": "3e3e", "inner": { "kind": "escape" } }"#,
        )
        .unwrap();
        let transform = spec.build(&TransformConfig::default()).unwrap();
        let resource = Resource::from_bytes(&b"a=3Db"[..]).with_transform(transform);
        assert_eq!(decode_all(&resource).unwrap(), b">>a=b");
    }

    #[test]
    fn test_build_rejects_bad_cipher_key() {
        let spec = TransformSpec::from_json(
            r#"{ "kind": "cipher", "cipher": { "family": "xor", "key": "" } }"#,
        )
        .unwrap();
        assert!(spec.build(&TransformConfig::default()).is_err());
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        assert!(matches!(
            TransformSpec::from_json(r#"{ "kind": "rar" }"#),
            Err(crate::error::TransformError::Config(_))
        ));
    }
}
