//! Composition wrappers
//!
//! Transforms built from other transforms: skip a header, inject a header,
//! chain two transforms, or decode escape sequences.

mod chain;
mod escape;
mod header_skip;
mod inject;

pub use chain::Chain;
pub use escape::{ESCAPE, EscapeDecode, EscapeDecoder};
pub use header_skip::HeaderSkip;
pub use inject::HeaderInject;
