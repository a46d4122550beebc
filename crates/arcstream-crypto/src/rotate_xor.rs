//! Nonlinear rotate-xor cipher
//!
//! Per byte, the register evolves first and is then folded into a mask:
//!
//! ```text
//! state ^= constant
//! state ^= rotl(state, 3)
//! mixed  = (state >> 16) ^ state
//! output = (mixed >> 8) ^ input ^ (mixed & 0xFF)
//! ```
//!
//! Only the low byte of `output` is kept.

use crate::keystream::Keystream;

/// Nonlinear rotate-xor cipher over a 32-bit register
#[derive(Debug, Clone)]
pub struct RotateXorCipher {
    initial: u32,
    constant: u32,
    state: u32,
}

impl RotateXorCipher {
    /// Initial register used when an archive format does not supply one.
    pub const DEFAULT_INITIAL: u32 = 0x0000_0000;

    /// Per-byte xor constant used when an archive format does not supply one.
    pub const DEFAULT_CONSTANT: u32 = 0x9E37_79B9;

    /// Create a cipher with the given initial register and xor constant.
    pub const fn new(initial: u32, constant: u32) -> Self {
        Self {
            initial,
            constant,
            state: initial,
        }
    }

    /// Current register value.
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// The per-byte xor constant.
    pub const fn constant(&self) -> u32 {
        self.constant
    }

    /// One evolution step, independent of any data.
    #[inline]
    pub const fn advance(state: u32, constant: u32) -> u32 {
        let state = state ^ constant;
        state ^ state.rotate_left(3)
    }

    /// Fold an evolved register into the byte mask.
    #[inline]
    pub const fn mix(state: u32) -> u8 {
        let mixed = (state >> 16) ^ state;
        ((mixed >> 8) ^ (mixed & 0xFF)) as u8
    }
}

impl Default for RotateXorCipher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL, Self::DEFAULT_CONSTANT)
    }
}

impl Keystream for RotateXorCipher {
    #[inline]
    fn next_mask(&mut self) -> u8 {
        self.state = Self::advance(self.state, self.constant);
        Self::mix(self.state)
    }

    fn reset(&mut self) {
        self.state = self.initial;
    }

    fn name(&self) -> &'static str {
        "rotate-xor"
    }
}
