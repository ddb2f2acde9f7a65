//! Sample-level audio helpers.

pub mod decode;

pub use decode::{decode, SampleEncoding};
