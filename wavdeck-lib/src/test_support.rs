//! In-memory WAV images and a capturing output sink for unit tests.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::container::wav::{FORMAT_IEEE_FLOAT, FORMAT_PCM};
use crate::dsp::ChannelSelect;
use crate::error::SinkError;
use crate::playback::sink::{OutputConfig, OutputSink, SinkOpener};
use crate::playback::track::{TrackControls, TrackSource};

/// 16-byte `fmt ` body.
pub(crate) fn fmt_chunk(format_tag: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * bits.div_ceil(8);
    let byte_rate = sample_rate * u32::from(block_align);
    let mut body = Vec::with_capacity(16);
    body.extend_from_slice(&format_tag.to_le_bytes());
    body.extend_from_slice(&channels.to_le_bytes());
    body.extend_from_slice(&sample_rate.to_le_bytes());
    body.extend_from_slice(&byte_rate.to_le_bytes());
    body.extend_from_slice(&block_align.to_le_bytes());
    body.extend_from_slice(&bits.to_le_bytes());
    body
}

/// RIFF/WAVE image from raw chunks, written without pad bytes.
pub(crate) fn riff(chunks: &[([u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut body = b"WAVE".to_vec();
    for (id, payload) in chunks {
        body.extend_from_slice(id);
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        body.extend_from_slice(payload);
    }
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&body);
    bytes
}

pub(crate) struct WavBuilder {
    format_tag: u16,
    bits: u16,
    channels: u16,
    sample_rate: u32,
    before_fmt: Vec<([u8; 4], Vec<u8>)>,
    before_data: Vec<([u8; 4], Vec<u8>)>,
    after_data: Vec<([u8; 4], Vec<u8>)>,
    data: Vec<u8>,
}

impl WavBuilder {
    pub(crate) fn new(format_tag: u16, bits: u16, channels: u16, sample_rate: u32) -> Self {
        Self {
            format_tag,
            bits,
            channels,
            sample_rate,
            before_fmt: Vec::new(),
            before_data: Vec::new(),
            after_data: Vec::new(),
            data: Vec::new(),
        }
    }

    pub(crate) fn pcm16(channels: u16, sample_rate: u32) -> Self {
        Self::new(FORMAT_PCM, 16, channels, sample_rate)
    }

    pub(crate) fn pcm24(channels: u16, sample_rate: u32) -> Self {
        Self::new(FORMAT_PCM, 24, channels, sample_rate)
    }

    pub(crate) fn float32(channels: u16, sample_rate: u32) -> Self {
        Self::new(FORMAT_IEEE_FLOAT, 32, channels, sample_rate)
    }

    pub(crate) fn chunk_before_fmt(mut self, id: [u8; 4], payload: Vec<u8>) -> Self {
        self.before_fmt.push((id, payload));
        self
    }

    pub(crate) fn chunk_before_data(mut self, id: [u8; 4], payload: Vec<u8>) -> Self {
        self.before_data.push((id, payload));
        self
    }

    pub(crate) fn chunk_after_data(mut self, id: [u8; 4], payload: Vec<u8>) -> Self {
        self.after_data.push((id, payload));
        self
    }

    pub(crate) fn samples_i16(mut self, samples: &[i16]) -> Self {
        for sample in samples {
            self.data.extend_from_slice(&sample.to_le_bytes());
        }
        self
    }

    pub(crate) fn samples_f32(mut self, samples: &[f32]) -> Self {
        for sample in samples {
            self.data.extend_from_slice(&sample.to_le_bytes());
        }
        self
    }

    pub(crate) fn raw_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut chunks = self.before_fmt;
        chunks.push((
            *b"fmt ",
            fmt_chunk(self.format_tag, self.channels, self.sample_rate, self.bits),
        ));
        chunks.extend(self.before_data);
        chunks.push((*b"data", self.data));
        chunks.extend(self.after_data);
        riff(&chunks)
    }
}

/// Track over an in-memory image, full volume, centred, both outputs.
pub(crate) fn track_from_bytes(bytes: Vec<u8>, chunk_bytes: usize) -> TrackSource<Cursor<Vec<u8>>> {
    track_with_controls(bytes, chunk_bytes, TrackControls::new(1.0, 0.0, ChannelSelect::Both))
}

pub(crate) fn track_with_controls(
    bytes: Vec<u8>,
    chunk_bytes: usize,
    controls: TrackControls,
) -> TrackSource<Cursor<Vec<u8>>> {
    TrackSource::from_reader(Cursor::new(bytes), "memory.wav", Arc::new(controls), chunk_bytes)
        .expect("test image should parse")
}

pub(crate) fn write_wav(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write test wav");
    path
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SinkEvent {
    Write(usize),
    Pause,
    Flush,
    Resume,
    Drain,
    DrainAborted,
}

#[derive(Debug, Default)]
pub(crate) struct CaptureLog {
    pub samples: Vec<i16>,
    pub events: Vec<SinkEvent>,
}

/// Sink that records everything written to it.
#[derive(Debug, Clone, Default)]
pub(crate) struct CaptureSink {
    log: Arc<Mutex<CaptureLog>>,
    fail_after_writes: Option<usize>,
    write_delay: Option<Duration>,
    drain_time: Option<Duration>,
    stop: Option<Arc<AtomicBool>>,
    writes: usize,
}

impl CaptureSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail every write after the first `writes` succeed.
    pub(crate) fn failing_after(mut self, writes: usize) -> Self {
        self.fail_after_writes = Some(writes);
        self
    }

    pub(crate) fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make `drain` take `time` to play out, giving up early on a stop request.
    pub(crate) fn with_drain_time(mut self, time: Duration) -> Self {
        self.drain_time = Some(time);
        self
    }

    pub(crate) fn samples(&self) -> Vec<i16> {
        self.log.lock().unwrap().samples.clone()
    }

    pub(crate) fn events(&self) -> Vec<SinkEvent> {
        self.log.lock().unwrap().events.clone()
    }

    /// Interleaved output split into `(left, right)` pairs.
    pub(crate) fn frames(&self) -> Vec<(i16, i16)> {
        self.samples()
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    fn record(&self, event: SinkEvent) {
        self.log.lock().unwrap().events.push(event);
    }
}

impl OutputSink for CaptureSink {
    fn write(&mut self, interleaved: &[i16]) -> Result<(), SinkError> {
        if self
            .fail_after_writes
            .is_some_and(|limit| self.writes >= limit)
        {
            return Err(SinkError::Write("capture sink closed".to_string()));
        }
        self.writes += 1;
        if let Some(delay) = self.write_delay {
            thread::sleep(delay);
        }
        let mut log = self.log.lock().unwrap();
        log.samples.extend_from_slice(interleaved);
        log.events.push(SinkEvent::Write(interleaved.len()));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.record(SinkEvent::Pause);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.record(SinkEvent::Flush);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SinkError> {
        self.record(SinkEvent::Resume);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        if let Some(time) = self.drain_time {
            let started = Instant::now();
            while started.elapsed() < time {
                if self
                    .stop
                    .as_ref()
                    .is_some_and(|stop| stop.load(Ordering::SeqCst))
                {
                    self.record(SinkEvent::DrainAborted);
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(2));
            }
        }
        self.record(SinkEvent::Drain);
        Ok(())
    }
}

/// Opener handing out clones of `sink` and counting how often it was called.
pub(crate) fn capture_opener(sink: CaptureSink, opens: Arc<AtomicUsize>) -> SinkOpener {
    Arc::new(move |config: &OutputConfig| {
        opens.fetch_add(1, Ordering::SeqCst);
        let mut sink = sink.clone();
        sink.stop = Some(config.stop.clone());
        Ok(Box::new(sink) as Box<dyn OutputSink>)
    })
}

pub(crate) fn unavailable_opener() -> SinkOpener {
    Arc::new(|_config: &OutputConfig| Err(SinkError::Unavailable("no device".to_string())))
}
