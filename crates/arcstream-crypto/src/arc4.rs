//! ARC4 (RC4-compatible) keystream
//!
//! Some archive formats encrypt entries with plain ARC4 under a per-archive
//! key. The permutation evolves only through the PRGA, never through the
//! data, so it fits the same reset-and-replay contract as the register
//! ciphers: resetting reruns the key schedule.
//!
//! ```rust
//! use arcstream_crypto::{Arc4Cipher, Keystream};
//!
//! let mut cipher = Arc4Cipher::new(b"Key").expect("valid key");
//! let mut data = b"Plaintext".to_vec();
//! cipher.apply(&mut data);
//! assert_eq!(data, [0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]);
//! ```

use crate::error::CryptoError;
use crate::keystream::Keystream;

/// Longest key accepted by the key schedule.
pub const MAX_KEY_LENGTH: usize = 256;

/// ARC4 stream cipher.
pub struct Arc4Cipher {
    /// Key retained so the schedule can be replayed on reset
    key: Vec<u8>,
    /// S-box state (256 bytes)
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Arc4Cipher {
    /// Create a new ARC4 cipher with the given key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the key is empty or
    /// longer than 256 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                actual: key.len(),
                min: 1,
                max: MAX_KEY_LENGTH,
            });
        }

        let mut cipher = Self {
            key: key.to_vec(),
            s: [0; 256],
            i: 0,
            j: 0,
        };
        cipher.schedule();
        Ok(cipher)
    }

    /// Key-scheduling algorithm (KSA)
    fn schedule(&mut self) {
        #[allow(clippy::cast_possible_truncation)] // i is 0..256
        for i in 0..256 {
            self.s[i] = i as u8;
        }

        let mut j = 0u8;
        for i in 0..256 {
            j = j
                .wrapping_add(self.s[i])
                .wrapping_add(self.key[i % self.key.len()]);
            self.s.swap(i, j as usize);
        }

        self.i = 0;
        self.j = 0;
    }
}

impl std::fmt::Debug for Arc4Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arc4Cipher")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

impl Keystream for Arc4Cipher {
    /// Pseudo-random generation algorithm (PRGA).
    fn next_mask(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);

        self.s.swap(self.i as usize, self.j as usize);

        let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
        self.s[k as usize]
    }

    fn reset(&mut self) {
        self.schedule();
    }

    fn name(&self) -> &'static str {
        "arc4"
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_arc4_known_vector() {
        // Test vector from RC4 specification
        let mut cipher = Arc4Cipher::new(b"Key").expect("ARC4 cipher creation should succeed");
        let mut data = b"Plaintext".to_vec();
        cipher.apply(&mut data);

        assert_eq!(data, [0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]);
    }

    #[test]
    fn test_arc4_reset_replays_keystream() {
        let mut cipher = Arc4Cipher::new(b"test_key").expect("ARC4 cipher creation should succeed");
        let original = b"Hello, ARC4 World!";

        let mut data = original.to_vec();
        cipher.apply(&mut data);
        assert_ne!(&data[..], original);

        cipher.reset();
        cipher.apply(&mut data);
        assert_eq!(&data[..], original);
    }

    #[test]
    fn test_arc4_different_keys() {
        let plaintext = b"Same plaintext";

        let mut first = plaintext.to_vec();
        Arc4Cipher::new(b"key1").unwrap().apply(&mut first);

        let mut second = plaintext.to_vec();
        Arc4Cipher::new(b"key2").unwrap().apply(&mut second);

        assert_ne!(first, second);
    }

    #[test]
    fn test_arc4_invalid_key_length() {
        assert!(Arc4Cipher::new(b"").is_err());
        assert!(Arc4Cipher::new(&[0u8; 257]).is_err());

        assert!(Arc4Cipher::new(b"a").is_ok());
        assert!(Arc4Cipher::new(&[0u8; 256]).is_ok());
    }

    #[test]
    fn test_arc4_discard_matches_apply() {
        let mut skipped = Arc4Cipher::new(b"skip").unwrap();
        skipped.discard(10);

        let mut applied = Arc4Cipher::new(b"skip").unwrap();
        let mut prefix = [0u8; 10];
        applied.apply(&mut prefix);

        assert_eq!(skipped.next_mask(), applied.next_mask());
    }
}
