//! Output sinks: the mixer's only way out to a device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, warn};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::error::SinkError;

use super::settings::MixerSettings;

/// Channel layout every sink receives: interleaved stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

const QUEUE_POLL_MS: u64 = 5;

/// Destination for interleaved stereo `i16` frames.
///
/// Sinks are created on the mixer thread and never leave it, so they do not
/// need to be `Send`.
pub trait OutputSink {
    /// Hand one buffer of interleaved frames to the device. May block until
    /// the device has room; this is the session's only pacing mechanism.
    fn write(&mut self, interleaved: &[i16]) -> Result<(), SinkError>;

    fn pause(&mut self) -> Result<(), SinkError>;

    /// Discard audio queued but not yet played. Best effort; may do nothing.
    fn flush(&mut self) -> Result<(), SinkError>;

    fn resume(&mut self) -> Result<(), SinkError>;

    /// Block until queued audio has played out. Called only when a session
    /// ends by itself, never on stop.
    fn drain(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Parameters handed to a [`SinkOpener`] when a session starts.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Raised when the session is asked to stop; blocking sinks should poll it.
    pub stop: Arc<AtomicBool>,
    pub settings: MixerSettings,
}

/// Factory for the sink of each session, invoked on the mixer thread.
pub type SinkOpener =
    Arc<dyn Fn(&OutputConfig) -> Result<Box<dyn OutputSink>, SinkError> + Send + Sync>;

/// Opener for the system's default output device.
pub fn default_output() -> SinkOpener {
    Arc::new(|config: &OutputConfig| {
        RodioSink::open(config).map(|sink| Box::new(sink) as Box<dyn OutputSink>)
    })
}

/// Sink backed by the default `rodio` output stream.
pub struct RodioSink {
    _stream: OutputStream,
    sink: Sink,
    sample_rate: u32,
    channels: u16,
    max_queued_chunks: usize,
    stop: Arc<AtomicBool>,
}

impl RodioSink {
    /// Open the default output stream, retrying a bounded number of times.
    pub fn open(config: &OutputConfig) -> Result<Self, SinkError> {
        let stream = open_output_stream_with_retry(&config.settings)?;
        let sink = Sink::connect_new(stream.mixer());
        sink.play();

        Ok(Self {
            _stream: stream,
            sink,
            sample_rate: config.sample_rate,
            channels: config.channels,
            max_queued_chunks: config.settings.max_queued_chunks,
            stop: config.stop.clone(),
        })
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl OutputSink for RodioSink {
    fn write(&mut self, interleaved: &[i16]) -> Result<(), SinkError> {
        if interleaved.is_empty() {
            return Ok(());
        }

        // Backpressure: wait for the device to work through the queue.
        if self.max_queued_chunks > 0 {
            while self.sink.len() >= self.max_queued_chunks {
                if self.stop_requested() {
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(QUEUE_POLL_MS));
            }
        }

        let samples: Vec<f32> = interleaved
            .iter()
            .map(|&sample| f32::from(sample) / 32768.0)
            .collect();
        self.sink
            .append(SamplesBuffer::new(self.channels, self.sample_rate, samples));
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.sink.pause();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.sink.clear();
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SinkError> {
        self.sink.play();
        Ok(())
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        while !self.sink.empty() {
            if self.stop_requested() {
                break;
            }
            thread::sleep(Duration::from_millis(QUEUE_POLL_MS));
        }
        Ok(())
    }
}

fn open_output_stream_with_retry(settings: &MixerSettings) -> Result<OutputStream, SinkError> {
    let attempts = settings.sink_open_retries.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last_error = err.to_string();
                if attempt == attempts {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        attempts, err
                    );
                    break;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, attempts, err
                );
                thread::sleep(Duration::from_millis(settings.sink_open_retry_ms));
            }
        }
    }
    Err(SinkError::Unavailable(last_error))
}
