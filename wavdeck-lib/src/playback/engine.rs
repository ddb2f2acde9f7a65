//! The read, decode, weight, sum, clip and write cycle.

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::audio::decode;
use crate::dsp::route_gains;
use crate::error::{MixerError, SinkError};

use super::sink::{OutputSink, OUTPUT_CHANNELS};
use super::track::{clamp_volume, TrackControls, TrackSource};

/// Session-wide controls shared between the caller and the mixer thread.
#[derive(Debug)]
pub struct MixControls {
    pending_seek: Mutex<Option<f64>>,
    master_volume: AtomicU32,
    position_frames: AtomicU64,
}

impl MixControls {
    pub fn new() -> Self {
        Self {
            pending_seek: Mutex::new(None),
            master_volume: AtomicU32::new(1.0_f32.to_bits()),
            position_frames: AtomicU64::new(0),
        }
    }

    /// Post a seek for the next cycle. A newer post replaces an unapplied one.
    pub fn post_seek(&self, seconds: f64) {
        let seconds = if seconds.is_nan() || seconds < 0.0 {
            0.0
        } else {
            seconds
        };
        *self.pending_seek.lock().unwrap() = Some(seconds);
    }

    pub(crate) fn take_seek(&self) -> Option<f64> {
        self.pending_seek.lock().unwrap().take()
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.master_volume
            .store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    /// Frames handed to the sink since the session started or last seeked.
    pub fn position_frames(&self) -> u64 {
        self.position_frames.load(Ordering::Relaxed)
    }

    fn set_position_frames(&self, frames: u64) {
        self.position_frames.store(frames, Ordering::Relaxed);
    }

    fn advance(&self, frames: usize) {
        self.position_frames
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Forget the previous session's position and any unapplied seek.
    /// The master volume carries over.
    pub(crate) fn reset(&self) {
        self.pending_seek.lock().unwrap().take();
        self.set_position_frames(0);
    }
}

impl Default for MixControls {
    fn default() -> Self {
        Self::new()
    }
}

/// Return the rate shared by every `(path, sample_rate)` pair, naming the
/// first track that disagrees with the first one.
pub fn check_sample_rates<'a, I>(tracks: I) -> Result<u32, MixerError>
where
    I: IntoIterator<Item = (&'a Path, u32)>,
{
    let mut tracks = tracks.into_iter();
    let Some((_, expected)) = tracks.next() else {
        return Err(MixerError::EmptyTrackList);
    };
    match tracks.find(|&(_, rate)| rate != expected) {
        Some((path, found)) => Err(MixerError::SampleRateMismatch {
            expected,
            found,
            path: path.to_path_buf(),
        }),
        None => Ok(expected),
    }
}

/// Result of one mix cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// This many stereo frames were written.
    Mixed(usize),
    /// Every track has ended.
    Finished,
}

/// Why [`MixerEngine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Stopped,
}

/// N tracks at one sample rate, mixed to interleaved stereo.
pub struct MixerEngine<R> {
    tracks: Vec<TrackSource<R>>,
    sample_rate: u32,
    controls: Arc<MixControls>,
    frames: Vec<usize>,
    decoded: Vec<i16>,
    acc: Vec<i32>,
    output: Vec<i16>,
}

impl<R: Read + Seek> MixerEngine<R> {
    pub fn new(tracks: Vec<TrackSource<R>>, controls: Arc<MixControls>) -> Result<Self, MixerError> {
        let sample_rate = check_sample_rates(
            tracks
                .iter()
                .map(|track| (track.path(), track.header().sample_rate)),
        )?;

        Ok(Self {
            frames: Vec::with_capacity(tracks.len()),
            tracks,
            sample_rate,
            controls,
            decoded: Vec::new(),
            acc: Vec::new(),
            output: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tracks(&self) -> &[TrackSource<R>] {
        &self.tracks
    }

    pub fn track_controls(&self) -> Vec<Arc<TrackControls>> {
        self.tracks
            .iter()
            .map(|track| track.controls().clone())
            .collect()
    }

    /// Length of the longest track.
    pub fn duration_seconds(&self) -> f64 {
        self.tracks
            .iter()
            .map(|track| track.header().duration_seconds())
            .fold(0.0, f64::max)
    }

    /// Run one cycle: apply a pending seek, mix whatever every track can
    /// supply in lockstep, and hand it to `sink`.
    ///
    /// The shortest contribution sets the cycle length; the rest stays in the
    /// tracks' carry buffers for the next cycle.
    pub fn cycle(&mut self, sink: &mut dyn OutputSink) -> Result<CycleOutcome, SinkError> {
        self.apply_pending_seek(sink);

        self.frames.clear();
        for track in &mut self.tracks {
            track.fill();
            let frames = if track.is_ended() {
                0
            } else {
                track.buffered().len() / track.header().bytes_per_frame()
            };
            self.frames.push(frames);
        }

        let Some(output_frames) = self.frames.iter().copied().filter(|&f| f > 0).min() else {
            return Ok(CycleOutcome::Finished);
        };

        let out_channels = usize::from(OUTPUT_CHANNELS);
        self.acc.clear();
        self.acc.resize(output_frames * out_channels, 0);

        for (track, &frames) in self.tracks.iter_mut().zip(&self.frames) {
            if frames == 0 {
                continue;
            }
            let header = *track.header();
            let volume = track.controls().volume();
            let gains = route_gains(track.controls().channel_select(), track.controls().pan());
            let channels = usize::from(header.channels);

            let bytes = output_frames * header.bytes_per_frame();
            decode(
                &track.buffered()[..bytes],
                header.encoding,
                header.channels,
                &mut self.decoded,
            );

            for (frame, out) in self
                .decoded
                .chunks_exact(channels)
                .zip(self.acc.chunks_exact_mut(out_channels))
            {
                let left = frame[0];
                let right = if channels > 1 { frame[1] } else { frame[0] };
                let l = (f32::from(left) * gains.left * volume) as i32;
                let r = (f32::from(right) * gains.right * volume) as i32;
                out[0] = out[0].saturating_add(l);
                out[1] = out[1].saturating_add(r);
            }

            track.consume(output_frames);
        }

        let master = self.controls.master_volume();
        self.output.clear();
        self.output.extend(self.acc.iter().map(|&sample| {
            let scaled = if master == 1.0 {
                sample
            } else {
                (sample as f32 * master) as i32
            };
            scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        }));

        sink.write(&self.output)?;
        self.controls.advance(output_frames);
        Ok(CycleOutcome::Mixed(output_frames))
    }

    /// Cycle until every track ends, `stop` is raised, or the sink fails.
    pub fn run(
        &mut self,
        sink: &mut dyn OutputSink,
        stop: &AtomicBool,
    ) -> Result<RunOutcome, SinkError> {
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(RunOutcome::Stopped);
            }
            if self.cycle(sink)? == CycleOutcome::Finished {
                return Ok(RunOutcome::Finished);
            }
        }
    }

    fn apply_pending_seek(&mut self, sink: &mut dyn OutputSink) {
        let Some(seconds) = self.controls.take_seek() else {
            return;
        };
        debug!("seeking {} tracks to {:.3}s", self.tracks.len(), seconds);

        for track in &mut self.tracks {
            track.seek_to_seconds(seconds);
        }
        let frame = (seconds * f64::from(self.sample_rate)).floor();
        self.controls.set_position_frames(frame as u64);

        if let Err(err) = sink.pause() {
            debug!("sink pause during seek failed: {}", err);
        }
        if let Err(err) = sink.flush() {
            debug!("sink flush during seek failed: {}", err);
        }
        if let Err(err) = sink.resume() {
            debug!("sink resume during seek failed: {}", err);
        }
    }
}
