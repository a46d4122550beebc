//! Repeating-key XOR
//!
//! The simplest member of the family: the register is the position within
//! the key. A one-byte key gives the common "xor every byte with N" scheme.

use crate::error::CryptoError;
use crate::keystream::Keystream;

/// Longest key accepted for repeating-key XOR.
pub const MAX_KEY_LENGTH: usize = 4096;

/// Repeating-key XOR cipher
#[derive(Debug, Clone)]
pub struct XorKeyCipher {
    key: Vec<u8>,
    position: usize,
}

impl XorKeyCipher {
    /// Create a cipher cycling through `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for an empty or oversized key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                actual: key.len(),
                min: 1,
                max: MAX_KEY_LENGTH,
            });
        }

        Ok(Self {
            key: key.to_vec(),
            position: 0,
        })
    }

    /// Single-byte key.
    pub fn single(byte: u8) -> Self {
        Self {
            key: vec![byte],
            position: 0,
        }
    }

    /// Key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Keystream for XorKeyCipher {
    #[inline]
    fn next_mask(&mut self) -> u8 {
        let mask = self.key[self.position];
        self.position = (self.position + 1) % self.key.len();
        mask
    }

    fn reset(&mut self) {
        self.position = 0;
    }

    fn name(&self) -> &'static str {
        "xor"
    }

    fn discard(&mut self, count: usize) {
        self.position = (self.position + count % self.key.len()) % self.key.len();
    }
}
