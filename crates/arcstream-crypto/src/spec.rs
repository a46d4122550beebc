//! Declarative cipher descriptions
//!
//! Archive plugins describe which keystream protects an entry with a
//! [`CipherSpec`]; the transform layer builds a fresh cipher from it for
//! every session, so no register state is ever shared.

use serde::{Deserialize, Serialize};

use crate::arc4::Arc4Cipher;
use crate::error::CryptoError;
use crate::keystream::Keystream;
use crate::rotate::RotateCipher;
use crate::rotate_xor::RotateXorCipher;
use crate::xor::XorKeyCipher;

/// A keystream family plus its initial parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "kebab-case")]
pub enum CipherSpec {
    /// Linear rotate register
    Rotate {
        /// Initial register value
        #[serde(default = "default_rotate_initial")]
        initial: u32,
    },
    /// Nonlinear rotate-xor register
    RotateXor {
        /// Initial register value
        #[serde(default)]
        initial: u32,
        /// Per-byte xor constant
        #[serde(default = "default_rotate_xor_constant")]
        constant: u32,
    },
    /// ARC4 keystream
    Arc4 {
        /// Key bytes, hex encoded in serialized form
        #[serde(with = "crate::key_hex")]
        key: Vec<u8>,
    },
    /// Repeating-key XOR
    Xor {
        /// Key bytes, hex encoded in serialized form
        #[serde(with = "crate::key_hex")]
        key: Vec<u8>,
    },
}

const fn default_rotate_initial() -> u32 {
    RotateCipher::DEFAULT_INITIAL
}

const fn default_rotate_xor_constant() -> u32 {
    RotateXorCipher::DEFAULT_CONSTANT
}

impl CipherSpec {
    /// Build a cipher positioned at its initial register.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is unusable for the family.
    pub fn build(&self) -> Result<Box<dyn Keystream>, CryptoError> {
        Ok(match self {
            Self::Rotate { initial } => Box::new(RotateCipher::new(*initial)),
            Self::RotateXor { initial, constant } => {
                Box::new(RotateXorCipher::new(*initial, *constant))
            }
            Self::Arc4 { key } => Box::new(Arc4Cipher::new(key)?),
            Self::Xor { key } => Box::new(XorKeyCipher::new(key)?),
        })
    }

    /// Family name, matching [`Keystream::name`].
    pub fn family(&self) -> &'static str {
        match self {
            Self::Rotate { .. } => "rotate",
            Self::RotateXor { .. } => "rotate-xor",
            Self::Arc4 { .. } => "arc4",
            Self::Xor { .. } => "xor",
        }
    }
}
