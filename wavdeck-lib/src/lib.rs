//! # Wavdeck Library
//!
//! Core of the wavdeck multi-track previewer: a chunked RIFF/WAVE parser, a
//! sample decoder for 16/24-bit PCM and 32-bit float sources, an equal-power
//! pan law, and a streaming mixer driven by a start/stop/seek transport.

pub mod audio;
pub mod container;
pub mod dsp;
pub mod error;
pub mod playback;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{FormatError, MixerError, SinkError};
