//! The keystream contract shared by every cipher family
//!
//! A keystream cipher owns a small register that evolves once per processed
//! byte. The evolution never looks at the data, so applying the same cipher
//! twice from the same initial register is the identity:
//!
//! ```
//! use arcstream_crypto::{Keystream, RotateCipher};
//!
//! let mut cipher = RotateCipher::new(0x1234_5678);
//! let mut data = b"archive payload".to_vec();
//! cipher.apply(&mut data);
//!
//! cipher.reset();
//! cipher.apply(&mut data);
//! assert_eq!(data, b"archive payload");
//! ```

/// Byte-wise reversible cipher driven by evolving register state
pub trait Keystream: Send {
    /// Produce the mask for the next byte and advance the register once.
    fn next_mask(&mut self) -> u8;

    /// Return the register to its initial value.
    fn reset(&mut self);

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Transform a single byte.
    #[inline]
    fn apply_byte(&mut self, byte: u8) -> u8 {
        byte ^ self.next_mask()
    }

    /// Transform a buffer in place.
    fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte = self.apply_byte(*byte);
        }
    }

    /// Skip `count` bytes of keystream without transforming anything.
    fn discard(&mut self, count: usize) {
        for _ in 0..count {
            self.next_mask();
        }
    }
}

impl<K: Keystream + ?Sized> Keystream for Box<K> {
    fn next_mask(&mut self) -> u8 {
        (**self).next_mask()
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
