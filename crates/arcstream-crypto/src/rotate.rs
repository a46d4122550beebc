//! Linear rotate cipher
//!
//! The register is a `u32` that rotates left by one bit per byte:
//! `state' = (state << 1) | ((state >> 31) & 1)`. Each byte is XOR-ed with
//! the low byte of the register *before* it rotates.
//!
//! A register of zero never changes, which makes the cipher the identity.

use crate::keystream::Keystream;

/// Linear rotate cipher over a 32-bit register
#[derive(Debug, Clone)]
pub struct RotateCipher {
    initial: u32,
    state: u32,
}

impl RotateCipher {
    /// Initial register used when an archive format does not supply one.
    pub const DEFAULT_INITIAL: u32 = 0x5A3C_96E1;

    /// Create a cipher whose register starts (and resets) at `initial`.
    pub const fn new(initial: u32) -> Self {
        Self {
            initial,
            state: initial,
        }
    }

    /// Current register value.
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Register value restored by [`Keystream::reset`].
    pub const fn initial(&self) -> u32 {
        self.initial
    }

    /// One evolution step, independent of any data.
    #[inline]
    pub const fn advance(state: u32) -> u32 {
        (state << 1) | ((state >> 31) & 1)
    }
}

impl Default for RotateCipher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL)
    }
}

impl Keystream for RotateCipher {
    #[inline]
    fn next_mask(&mut self) -> u8 {
        let mask = (self.state & 0xFF) as u8;
        self.state = Self::advance(self.state);
        mask
    }

    fn reset(&mut self) {
        self.state = self.initial;
    }

    fn name(&self) -> &'static str {
        "rotate"
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advance_rotates_high_bit_into_low_bit() {
        assert_eq!(RotateCipher::advance(0x8000_0000), 0x0000_0001);
        assert_eq!(RotateCipher::advance(0x0000_0001), 0x0000_0002);
        assert_eq!(RotateCipher::advance(0xC000_0000), 0x8000_0001);
    }

    #[test]
    fn test_masks_follow_register() {
        let mut cipher = RotateCipher::new(0x8000_0081);
        // mask comes from the register before the rotation
        assert_eq!(cipher.next_mask(), 0x81);
        assert_eq!(cipher.state(), 0x0000_0103);
        assert_eq!(cipher.next_mask(), 0x03);
        assert_eq!(cipher.next_mask(), 0x06);
    }

    #[test]
    fn test_zero_register_is_identity() {
        let mut cipher = RotateCipher::new(0);
        let mut data = b"unchanged".to_vec();
        cipher.apply(&mut data);
        assert_eq!(data, b"unchanged");
    }

    #[test]
    fn test_register_period_is_32() {
        let mut cipher = RotateCipher::new(0x1234_5678);
        cipher.discard(32);
        assert_eq!(cipher.state(), 0x1234_5678);
    }

    proptest! {
        #[test]
        fn rotate_is_self_inverse(
            data in prop::collection::vec(any::<u8>(), 0..2048),
            initial in any::<u32>()
        ) {
            let mut cipher = RotateCipher::new(initial);
            let mut buffer = data.clone();
            cipher.apply(&mut buffer);
            cipher.reset();
            cipher.apply(&mut buffer);
            prop_assert_eq!(buffer, data);
        }
    }
}
