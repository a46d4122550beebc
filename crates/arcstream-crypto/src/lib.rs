//! Keyed keystream ciphers for archive byte-transform streams
//!
//! Game and application archives frequently obscure entry data with small
//! stream ciphers whose register evolves once per byte, independent of the
//! data. This crate provides those register families behind one
//! [`Keystream`] trait so the transform layer can replay them identically on
//! decode and on re-encode.
//!
//! # Families
//!
//! - [`RotateCipher`]: linear one-bit rotation of a 32-bit register
//! - [`RotateXorCipher`]: nonlinear xor/rotate/fold register
//! - [`Arc4Cipher`]: ARC4 keystream
//! - [`XorKeyCipher`]: repeating-key XOR
//!
//! [`CipherSpec`] is the serializable description used by configuration.
//! Keys are written as hex text; [`key_hex`] parses that form.

#![warn(missing_docs)]

pub mod arc4;
pub mod error;
pub mod key_hex;
pub mod keystream;
pub mod rotate;
pub mod rotate_xor;
pub mod spec;
pub mod xor;

pub use arc4::Arc4Cipher;
pub use error::CryptoError;
pub use key_hex::HexBytes;
pub use keystream::Keystream;
pub use rotate::RotateCipher;
pub use rotate_xor::RotateXorCipher;
pub use spec::CipherSpec;
pub use xor::XorKeyCipher;
