//! Normalization of raw WAV payload bytes into 16-bit samples.
//!
//! Every supported source encoding is folded into the signed 16-bit domain
//! before mixing. The conversions are lossy but bit-exact: 24-bit sources are
//! truncated by a plain arithmetic shift and float sources are truncated
//! toward zero after scaling.

use serde::{Deserialize, Serialize};

use crate::container::wav::{FORMAT_IEEE_FLOAT, FORMAT_PCM};

/// Supported on-disk sample encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    Pcm16,
    Pcm24,
    Float32,
}

impl SampleEncoding {
    /// Map a `fmt ` chunk's format tag and bit depth to an encoding.
    pub fn from_format(format_tag: u16, bits_per_sample: u16) -> Option<Self> {
        match (format_tag, bits_per_sample) {
            (FORMAT_PCM, 16) => Some(Self::Pcm16),
            (FORMAT_PCM, 24) => Some(Self::Pcm24),
            (FORMAT_IEEE_FLOAT, 32) => Some(Self::Float32),
            _ => None,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24 => 24,
            Self::Float32 => 32,
        }
    }

    /// Packed byte width of one sample (24-bit uses three bytes).
    pub fn bytes_per_sample(self) -> usize {
        usize::from(self.bits_per_sample()).div_ceil(8)
    }
}

/// Decode `bytes` into `out`, replacing its contents.
///
/// # Returns
///
/// The number of complete frames decoded. Samples of a trailing partial
/// frame are still written to `out` but not counted; an incomplete trailing
/// sample is dropped.
pub fn decode(bytes: &[u8], encoding: SampleEncoding, channels: u16, out: &mut Vec<i16>) -> usize {
    out.clear();
    match encoding {
        SampleEncoding::Pcm16 => out.extend(
            bytes
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        ),
        SampleEncoding::Pcm24 => out.extend(
            bytes
                .chunks_exact(3)
                .map(|b| pcm24_to_i16(b[0], b[1], b[2])),
        ),
        SampleEncoding::Float32 => out.extend(
            bytes
                .chunks_exact(4)
                .map(|b| float_to_i16(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))),
        ),
    }

    if channels == 0 {
        return 0;
    }
    out.len() / usize::from(channels)
}

#[inline]
fn pcm24_to_i16(b0: u8, b1: u8, b2: u8) -> i16 {
    let mut value = i32::from(b0) | (i32::from(b1) << 8) | (i32::from(b2) << 16);
    if value & 0x0080_0000 != 0 {
        value |= 0xFF00_0000_u32 as i32;
    }
    (value >> 8) as i16
}

#[inline]
fn float_to_i16(sample: f32) -> i16 {
    let scaled = (sample.clamp(-1.0, 1.0) * 32767.0) as i32;
    scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_reinterprets_little_endian_pairs() {
        let bytes = [0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F];
        let mut out = Vec::new();
        let frames = decode(&bytes, SampleEncoding::Pcm16, 2, &mut out);
        assert_eq!(out, vec![1, -1, i16::MIN, i16::MAX]);
        assert_eq!(frames, 2);
    }

    #[test]
    fn pcm16_drops_odd_trailing_byte() {
        let bytes = [0x10, 0x00, 0x20];
        let mut out = Vec::new();
        let frames = decode(&bytes, SampleEncoding::Pcm16, 1, &mut out);
        assert_eq!(out, vec![16]);
        assert_eq!(frames, 1);
    }

    #[test]
    fn pcm24_minimum_negative_maps_to_i16_min() {
        let mut out = Vec::new();
        decode(&[0x00, 0x00, 0x80], SampleEncoding::Pcm24, 1, &mut out);
        assert_eq!(out, vec![-32768]);
    }

    #[test]
    fn pcm24_truncates_instead_of_rounding() {
        let bytes = [
            0xFF, 0xFF, 0x7F, // max positive
            0xFF, 0x00, 0x00, // 255: below one 16-bit step
            0xFF, 0xFF, 0xFF, // -1 stays -1 after arithmetic shift
            0x80, 0x01, 0x00, // 0x000180 -> 1
        ];
        let mut out = Vec::new();
        let frames = decode(&bytes, SampleEncoding::Pcm24, 2, &mut out);
        assert_eq!(out, vec![32767, 0, -1, 1]);
        assert_eq!(frames, 2);
    }

    #[test]
    fn float32_scales_clamps_and_truncates() {
        let samples = [1.0_f32, -1.0, 0.5, -0.5, 2.0, -3.0, 0.00001, f32::NAN];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = Vec::new();
        let frames = decode(&bytes, SampleEncoding::Float32, 1, &mut out);
        assert_eq!(out, vec![32767, -32767, 16383, -16383, 32767, -32767, 0, 0]);
        assert_eq!(frames, 8);
    }

    #[test]
    fn frame_count_uses_integer_division() {
        let bytes = [0_u8; 10];
        let mut out = Vec::new();
        let frames = decode(&bytes, SampleEncoding::Pcm16, 2, &mut out);
        assert_eq!(out.len(), 5);
        assert_eq!(frames, 2);
    }

    #[test]
    fn encodings_report_packed_widths() {
        assert_eq!(SampleEncoding::Pcm16.bytes_per_sample(), 2);
        assert_eq!(SampleEncoding::Pcm24.bytes_per_sample(), 3);
        assert_eq!(SampleEncoding::Float32.bytes_per_sample(), 4);
        assert_eq!(SampleEncoding::from_format(FORMAT_PCM, 8), None);
    }
}
