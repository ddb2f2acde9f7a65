//! Track sources and their live, thread-shared controls.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::container::wav::{parse_header, read_full, WavHeader};
use crate::dsp::ChannelSelect;
use crate::error::{FormatError, MixerError};

/// Clamp a volume to `[0, 1]`; NaN becomes silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Clamp a pan position to `[-1, 1]`; NaN becomes centre.
pub fn clamp_pan(pan: f32) -> f32 {
    if pan.is_nan() {
        0.0
    } else {
        pan.clamp(-1.0, 1.0)
    }
}

/// Caller-side description of one track to open.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub path: PathBuf,
    pub channel_select: ChannelSelect,
    pub volume: f32,
    pub pan: f32,
}

impl TrackSpec {
    /// Track at full volume, centred, routed to both outputs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            channel_select: ChannelSelect::Both,
            volume: 1.0,
            pan: 0.0,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = clamp_volume(volume);
        self
    }

    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = clamp_pan(pan);
        self
    }

    pub fn with_channel_select(mut self, channel_select: ChannelSelect) -> Self {
        self.channel_select = channel_select;
        self
    }
}

/// Live per-track parameters.
///
/// Each field is its own atomic slot: writers never block the mixer, the
/// last write wins, and the mixer reads every field once per cycle.
#[derive(Debug)]
pub struct TrackControls {
    volume: AtomicU32,
    pan: AtomicU32,
    channel_select: AtomicU8,
}

impl TrackControls {
    pub fn new(volume: f32, pan: f32, channel_select: ChannelSelect) -> Self {
        Self {
            volume: AtomicU32::new(clamp_volume(volume).to_bits()),
            pan: AtomicU32::new(clamp_pan(pan).to_bits()),
            channel_select: AtomicU8::new(channel_select.to_u8()),
        }
    }

    pub fn from_spec(spec: &TrackSpec) -> Self {
        Self::new(spec.volume, spec.pan, spec.channel_select)
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }

    pub fn pan(&self) -> f32 {
        f32::from_bits(self.pan.load(Ordering::Relaxed))
    }

    pub fn set_pan(&self, pan: f32) {
        self.pan.store(clamp_pan(pan).to_bits(), Ordering::Relaxed);
    }

    pub fn channel_select(&self) -> ChannelSelect {
        ChannelSelect::from_u8(self.channel_select.load(Ordering::Relaxed))
    }

    pub fn set_channel_select(&self, channel_select: ChannelSelect) {
        self.channel_select
            .store(channel_select.to_u8(), Ordering::Relaxed);
    }
}

/// One open track inside a mixer session.
///
/// The stream is read only by the mixer thread. Bytes that were read but not
/// yet mixed stay in a carry buffer that is topped up to the chunk size on
/// every cycle, so a track never loses audio when a slower track throttles
/// the cycle.
#[derive(Debug)]
pub struct TrackSource<R> {
    path: PathBuf,
    header: WavHeader,
    reader: R,
    controls: Arc<TrackControls>,
    ended: bool,
    /// Bytes consumed from the data chunk, relative to `data_offset`.
    position: u64,
    pending: Vec<u8>,
    capacity: usize,
}

/// Parse the header of `spec`'s file without keeping the file open.
pub fn probe_header(spec: &TrackSpec) -> Result<WavHeader, MixerError> {
    let mut reader = open_file(&spec.path)?;
    parse_header(&mut reader).map_err(|source| MixerError::Format {
        path: spec.path.clone(),
        source,
    })
}

fn open_file(path: &Path) -> Result<BufReader<File>, MixerError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| MixerError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })
}

impl TrackSource<BufReader<File>> {
    /// Open the file described by `spec` and position it at its first sample.
    pub fn open(spec: &TrackSpec, chunk_bytes: usize) -> Result<Self, MixerError> {
        let reader = open_file(&spec.path)?;
        let controls = Arc::new(TrackControls::from_spec(spec));
        Self::from_reader(reader, &spec.path, controls, chunk_bytes).map_err(|source| {
            MixerError::Format {
                path: spec.path.clone(),
                source,
            }
        })
    }
}

impl<R: Read + Seek> TrackSource<R> {
    /// Parse the header from a reader at offset 0 and wrap it as a track.
    pub fn from_reader(
        mut reader: R,
        path: impl AsRef<Path>,
        controls: Arc<TrackControls>,
        chunk_bytes: usize,
    ) -> Result<Self, FormatError> {
        let header = parse_header(&mut reader)?;
        debug!(
            "opened {:?}: {:?}, {} ch, {} Hz, {} data bytes at {}",
            path.as_ref(),
            header.encoding,
            header.channels,
            header.sample_rate,
            header.data_len,
            header.data_offset
        );
        let capacity = chunk_bytes.max(header.bytes_per_frame());
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            header,
            reader,
            controls,
            ended: false,
            position: 0,
            pending: Vec::with_capacity(capacity),
            capacity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    pub fn controls(&self) -> &Arc<TrackControls> {
        &self.controls
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Top the carry buffer up to the chunk size without reading past the
    /// data chunk. Marks the track ended once less than a frame is left.
    pub(crate) fn fill(&mut self) {
        if self.ended {
            return;
        }

        let remaining = self.header.data_len.saturating_sub(self.position);
        let room = self.capacity - self.pending.len();
        let want = usize::try_from(remaining).map_or(room, |remaining| remaining.min(room));

        if want > 0 {
            let start = self.pending.len();
            self.pending.resize(start + want, 0);
            match read_full(&mut self.reader, &mut self.pending[start..]) {
                Ok(read) => {
                    self.pending.truncate(start + read);
                    self.position += read as u64;
                }
                Err(err) => {
                    warn!("read failed on {:?}, silencing track: {}", self.path, err);
                    self.mark_ended();
                    return;
                }
            }
        }

        if self.pending.len() < self.header.bytes_per_frame() {
            self.mark_ended();
        }
    }

    /// Raw bytes available for the current cycle.
    pub(crate) fn buffered(&self) -> &[u8] {
        &self.pending
    }

    /// Drop `frames` mixed frames from the front of the carry buffer.
    pub(crate) fn consume(&mut self, frames: usize) {
        let bytes = (frames * self.header.bytes_per_frame()).min(self.pending.len());
        self.pending.drain(..bytes);
    }

    /// Reposition to `seconds` into the data chunk.
    ///
    /// A target past the end is accepted; the next `fill` then ends the
    /// track. Unrepresentable targets and seek errors end the track at once.
    pub(crate) fn seek_to_seconds(&mut self, seconds: f64) -> bool {
        let frame = (seconds * f64::from(self.header.sample_rate)).floor();
        let relative = if frame.is_finite() && frame >= 0.0 && frame < u64::MAX as f64 {
            (frame as u64).checked_mul(self.header.bytes_per_frame() as u64)
        } else {
            None
        };
        let Some((relative, target)) = relative.and_then(|relative| {
            self.header
                .data_offset
                .checked_add(relative)
                .map(|target| (relative, target))
        }) else {
            warn!("seek to {}s is out of range for {:?}", seconds, self.path);
            self.mark_ended();
            return false;
        };

        match self.reader.seek(SeekFrom::Start(target)) {
            Ok(_) => {
                self.position = relative;
                self.pending.clear();
                self.ended = false;
                true
            }
            Err(err) => {
                warn!("seek failed on {:?}, silencing track: {}", self.path, err);
                self.mark_ended();
                false
            }
        }
    }

    pub(crate) fn mark_ended(&mut self) {
        if !self.ended {
            debug!("track {:?} ended", self.path);
        }
        self.ended = true;
        self.pending.clear();
    }
}
