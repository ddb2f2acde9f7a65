//! Container parsing for track sources.

pub mod wav;

pub use wav::{open_header, parse_header, WavHeader};
