//! RIFF/WAVE header parsing.
//!
//! Only the `fmt ` and `data` chunks are interpreted. Everything else is
//! skipped by its declared size. The parser stops as soon as the `data` chunk
//! header has been read, leaving the payload untouched, so the reader is left
//! positioned at the first sample byte.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::audio::SampleEncoding;
use crate::error::FormatError;

const PROLOGUE_SIZE: usize = 12;
const CHUNK_HEADER_SIZE: usize = 8;
const FMT_BASE_SIZE: usize = 16;
// Extensible format chunks carry the real tag at the start of a sub-format GUID.
const FMT_EXTENSIBLE_SIZE: usize = 40;
const FMT_SUBFORMAT_OFFSET: usize = 24;

/// Format tag for integer PCM.
pub const FORMAT_PCM: u16 = 0x0001;
/// Format tag for IEEE-754 float samples.
pub const FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// Format tag signalling `WAVE_FORMAT_EXTENSIBLE`.
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Parsed, validated description of a WAV file's audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub encoding: SampleEncoding,
    pub channels: u16,
    pub sample_rate: u32,
    /// Absolute byte offset of the first sample in the file.
    pub data_offset: u64,
    /// Declared byte length of the `data` chunk.
    pub data_len: u64,
}

impl WavHeader {
    pub fn bits_per_sample(&self) -> u16 {
        self.encoding.bits_per_sample()
    }

    /// Bytes occupied by one frame (one sample for every channel).
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * self.encoding.bytes_per_sample()
    }

    pub fn frame_count(&self) -> u64 {
        self.data_len / self.bytes_per_frame() as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }
}

#[derive(Debug, Default)]
struct FmtChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// Open `path` and parse its header.
pub fn open_header(path: impl AsRef<Path>) -> Result<WavHeader, FormatError> {
    let mut reader = BufReader::new(File::open(path)?);
    parse_header(&mut reader)
}

/// Parse a RIFF/WAVE header from a reader positioned at offset 0.
///
/// On success the reader is positioned at `data_offset`.
pub fn parse_header<R: Read>(reader: &mut R) -> Result<WavHeader, FormatError> {
    let mut prologue = [0_u8; PROLOGUE_SIZE];
    if read_full(reader, &mut prologue)? < PROLOGUE_SIZE {
        return Err(FormatError::NotRiffWave);
    }
    if &prologue[0..4] != b"RIFF" || &prologue[8..12] != b"WAVE" {
        return Err(FormatError::NotRiffWave);
    }

    let mut position = PROLOGUE_SIZE as u64;
    let mut fmt: Option<FmtChunk> = None;
    let mut data: Option<(u64, u64)> = None;
    let mut chunk_header = [0_u8; CHUNK_HEADER_SIZE];

    loop {
        if read_full(reader, &mut chunk_header)? < CHUNK_HEADER_SIZE {
            break;
        }
        position += CHUNK_HEADER_SIZE as u64;
        let size = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]) as u64;

        match &chunk_header[0..4] {
            b"fmt " => {
                fmt = Some(read_fmt_chunk(reader, size)?);
                position += size;
            }
            b"data" => {
                data = Some((position, size));
                break;
            }
            _ => {
                let skipped = io::copy(&mut reader.by_ref().take(size), &mut io::sink())?;
                position += skipped;
                if skipped < size {
                    break;
                }
            }
        }
    }

    let fmt = fmt.ok_or_else(|| FormatError::MalformedContainer("missing fmt chunk".into()))?;
    let encoding = SampleEncoding::from_format(fmt.format_tag, fmt.bits_per_sample).ok_or(
        FormatError::UnsupportedEncoding {
            format_tag: fmt.format_tag,
            bits_per_sample: fmt.bits_per_sample,
        },
    )?;
    let (data_offset, data_len) =
        data.ok_or_else(|| FormatError::MalformedContainer("missing data chunk".into()))?;

    if data_len == 0 {
        return Err(FormatError::MalformedContainer("empty data chunk".into()));
    }
    if fmt.channels == 0 {
        return Err(FormatError::MalformedContainer(
            "channel count cannot be zero".into(),
        ));
    }
    if fmt.sample_rate == 0 {
        return Err(FormatError::MalformedContainer(
            "sample rate cannot be zero".into(),
        ));
    }

    Ok(WavHeader {
        encoding,
        channels: fmt.channels,
        sample_rate: fmt.sample_rate,
        data_offset,
        data_len,
    })
}

fn read_fmt_chunk<R: Read>(reader: &mut R, size: u64) -> Result<FmtChunk, FormatError> {
    // Only the leading fields matter; anything past the extensible layout is skipped.
    let keep = size.min(FMT_EXTENSIBLE_SIZE as u64) as usize;
    let mut body = vec![0_u8; keep];
    if read_full(reader, &mut body)? < keep {
        return Err(FormatError::MalformedContainer("truncated fmt chunk".into()));
    }
    let rest = size - keep as u64;
    if rest > 0 && io::copy(&mut reader.by_ref().take(rest), &mut io::sink())? < rest {
        return Err(FormatError::MalformedContainer("truncated fmt chunk".into()));
    }

    if body.len() < 8 {
        return Err(FormatError::MalformedContainer(format!(
            "fmt chunk too short: {} bytes",
            body.len()
        )));
    }

    let mut chunk = FmtChunk {
        format_tag: u16::from_le_bytes([body[0], body[1]]),
        channels: u16::from_le_bytes([body[2], body[3]]),
        sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
        bits_per_sample: 0,
    };
    if body.len() >= FMT_BASE_SIZE {
        chunk.bits_per_sample = u16::from_le_bytes([body[14], body[15]]);
    }
    if chunk.format_tag == FORMAT_EXTENSIBLE && body.len() >= FMT_EXTENSIBLE_SIZE {
        chunk.format_tag =
            u16::from_le_bytes([body[FMT_SUBFORMAT_OFFSET], body[FMT_SUBFORMAT_OFFSET + 1]]);
    }

    Ok(chunk)
}

/// Fill `buf` as far as the reader allows, returning the number of bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fmt_chunk, riff, WavBuilder};
    use std::io::{Cursor, Seek};

    #[test]
    fn parses_canonical_pcm16_header() {
        let bytes = WavBuilder::pcm16(2, 44_100).samples_i16(&[1, 2, 3, 4]).build();
        let mut cursor = Cursor::new(bytes);
        let header = parse_header(&mut cursor).expect("parse");

        assert_eq!(header.encoding, SampleEncoding::Pcm16);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.data_offset, 44);
        assert_eq!(header.data_len, 8);
        assert_eq!(header.bytes_per_frame(), 4);
        assert_eq!(header.frame_count(), 2);
        assert_eq!(cursor.stream_position().unwrap(), 44);
    }

    #[test]
    fn rejects_non_riff_input() {
        let mut bytes = WavBuilder::pcm16(1, 8_000).samples_i16(&[0]).build();
        bytes[0..4].copy_from_slice(b"RIFX");
        let err = parse_header(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, FormatError::NotRiffWave));

        let err = parse_header(&mut Cursor::new(b"RIFF".to_vec())).unwrap_err();
        assert!(matches!(err, FormatError::NotRiffWave));
    }

    #[test]
    fn skips_unknown_and_odd_sized_chunks() {
        let bytes = WavBuilder::pcm16(1, 22_050)
            .chunk_before_fmt(*b"JUNK", vec![0xAA; 7])
            .chunk_before_data(*b"LIST", vec![0x55; 13])
            .samples_i16(&[10, -10])
            .build();
        let header = parse_header(&mut Cursor::new(bytes)).expect("parse");

        // 12 prologue + (8 + 7) JUNK + (8 + 16) fmt + (8 + 13) LIST + 8 data header
        assert_eq!(header.data_offset, 12 + 15 + 24 + 21 + 8);
        assert_eq!(header.data_len, 4);
    }

    #[test]
    fn accepts_supported_encodings() {
        let pcm24 = WavBuilder::pcm24(2, 48_000).raw_data(vec![0; 6]).build();
        let float = WavBuilder::float32(1, 48_000).samples_f32(&[0.5]).build();

        let pcm24 = parse_header(&mut Cursor::new(pcm24)).expect("pcm24");
        let float = parse_header(&mut Cursor::new(float)).expect("float");

        assert_eq!(pcm24.encoding, SampleEncoding::Pcm24);
        assert_eq!(pcm24.bytes_per_frame(), 6);
        assert_eq!(float.encoding, SampleEncoding::Float32);
        assert_eq!(float.bytes_per_frame(), 4);
    }

    #[test]
    fn rejects_unsupported_combinations() {
        let pcm8 = WavBuilder::new(FORMAT_PCM, 8, 1, 8_000).raw_data(vec![0; 4]).build();
        let float64 = WavBuilder::new(FORMAT_IEEE_FLOAT, 64, 1, 8_000)
            .raw_data(vec![0; 8])
            .build();
        let pcm32 = WavBuilder::new(FORMAT_PCM, 32, 1, 8_000).raw_data(vec![0; 4]).build();

        for bytes in [pcm8, float64, pcm32] {
            let err = parse_header(&mut Cursor::new(bytes)).unwrap_err();
            assert!(matches!(err, FormatError::UnsupportedEncoding { .. }));
        }
    }

    #[test]
    fn short_fmt_chunk_leaves_bits_unset() {
        let mut fmt = fmt_chunk(FORMAT_PCM, 1, 8_000, 16);
        fmt.truncate(14);
        let bytes = riff(&[(*b"fmt ", fmt), (*b"data", vec![0; 4])]);
        let err = parse_header(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedEncoding {
                bits_per_sample: 0,
                ..
            }
        ));
    }

    #[test]
    fn missing_chunks_are_malformed() {
        let no_data = riff(&[(*b"fmt ", fmt_chunk(FORMAT_PCM, 1, 8_000, 16))]);
        let no_fmt = riff(&[(*b"data", vec![0; 4])]);
        let empty_data = riff(&[
            (*b"fmt ", fmt_chunk(FORMAT_PCM, 1, 8_000, 16)),
            (*b"data", Vec::new()),
        ]);

        for bytes in [no_data, no_fmt, empty_data] {
            let err = parse_header(&mut Cursor::new(bytes)).unwrap_err();
            assert!(matches!(err, FormatError::MalformedContainer(_)), "{err:?}");
        }
    }

    #[test]
    fn resolves_extensible_format_tag() {
        let mut fmt = fmt_chunk(FORMAT_EXTENSIBLE, 2, 96_000, 24);
        fmt.extend_from_slice(&22_u16.to_le_bytes());
        fmt.extend_from_slice(&24_u16.to_le_bytes());
        fmt.extend_from_slice(&3_u32.to_le_bytes());
        let mut guid = [0_u8; 16];
        guid[0..2].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        fmt.extend_from_slice(&guid);
        let bytes = riff(&[(*b"fmt ", fmt), (*b"data", vec![0; 6])]);

        let header = parse_header(&mut Cursor::new(bytes)).expect("parse");
        assert_eq!(header.encoding, SampleEncoding::Pcm24);
        assert_eq!(header.sample_rate, 96_000);
    }

    #[test]
    fn reads_header_written_by_hound() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hound.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 32_000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("create");
        for value in [1_i32, -1, 8_388_607, -8_388_608] {
            writer.write_sample(value).expect("write");
        }
        writer.finalize().expect("finalize");

        let header = open_header(&path).expect("parse");
        assert_eq!(header.encoding, SampleEncoding::Pcm24);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 32_000);
        assert_eq!(header.data_len, 12);
        assert_eq!(header.frame_count(), 2);
    }
}
