//! Caller-facing session control: start, stop, seek and live updates.
//!
//! A [`Transport`] owns at most one session at a time. The session runs either
//! on an installed [`PreviewBackend`] or, as the portable path, on a mixer
//! worker thread driving a [`MixerEngine`].

mod backend;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::container::open_header;
use crate::dsp::ChannelSelect;
use crate::error::{MixerError, SinkError};

use super::engine::{check_sample_rates, MixControls, MixerEngine};
use super::settings::MixerSettings;
use super::sink::{default_output, SinkOpener};
use super::track::{
    clamp_pan, clamp_volume, probe_header, TrackControls, TrackSource, TrackSpec,
};

pub use backend::PreviewBackend;
use worker::{run_mixer_thread, WorkerContext};

const STOP_POLL_MS: u64 = 10;

/// Lifecycle of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Closed,
}

pub(super) fn set_state(state: &Mutex<SessionState>, next: SessionState) {
    *state.lock().unwrap() = next;
}

struct MixerSession {
    handle: Option<JoinHandle<()>>,
    abort: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    tracks: Vec<Arc<TrackControls>>,
    sample_rate: u32,
    duration: f64,
}

enum ActivePath {
    Idle,
    Preferred { track_count: usize, duration: f64 },
    Mixer(MixerSession),
}

/// Multi-track WAV preview player.
pub struct Transport {
    opener: SinkOpener,
    settings: MixerSettings,
    preferred: Option<Box<dyn PreviewBackend>>,
    active: ActivePath,
    state: Arc<Mutex<SessionState>>,
    controls: Arc<MixControls>,
    lingering: Vec<JoinHandle<()>>,
}

impl Transport {
    /// Transport whose mixer sessions write to sinks created by `opener`.
    pub fn new(opener: SinkOpener, settings: MixerSettings) -> Self {
        Self {
            opener,
            settings: settings.sanitized(),
            preferred: None,
            active: ActivePath::Idle,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            controls: Arc::new(MixControls::new()),
            lingering: Vec::new(),
        }
    }

    /// Transport playing through the default output device.
    pub fn with_default_output(settings: MixerSettings) -> Self {
        Self::new(default_output(), settings)
    }

    /// Install a backend that `start` tries before the software mixer.
    pub fn with_preferred_backend(mut self, backend: Box<dyn PreviewBackend>) -> Self {
        self.preferred = Some(backend);
        self
    }

    /// Start previewing `tracks`, replacing any current session.
    ///
    /// The previous session is stopped and joined before any file is opened.
    /// On error nothing stays open and the state ends up `Closed`.
    pub fn start(&mut self, tracks: &[TrackSpec]) -> Result<(), MixerError> {
        self.halt();
        self.join_lingering();

        if tracks.is_empty() {
            return Err(MixerError::EmptyTrackList);
        }

        self.state = Arc::new(Mutex::new(SessionState::Starting));
        self.controls.reset();

        if let Some(backend) = self.preferred.as_mut() {
            match backend.start(tracks) {
                Ok(()) => {
                    info!("preview started on {} ({} tracks)", backend.name(), tracks.len());
                    backend.set_master_volume(self.controls.master_volume());
                    set_state(&self.state, SessionState::Running);
                    self.active = ActivePath::Preferred {
                        track_count: tracks.len(),
                        duration: longest_duration(tracks),
                    };
                    return Ok(());
                }
                Err(err) => {
                    warn!("{} failed to start, using the mixer: {}", backend.name(), err);
                    backend.stop();
                }
            }
        }

        match self.start_mixer(tracks) {
            Ok(session) => {
                self.active = ActivePath::Mixer(session);
                Ok(())
            }
            Err(err) => {
                set_state(&self.state, SessionState::Closed);
                Err(err)
            }
        }
    }

    /// Stop the current session. Safe to call at any time, any number of times.
    pub fn stop(&mut self) {
        self.halt();
    }

    /// Post a seek to `position_seconds`. Negative and NaN positions become 0.
    pub fn seek(&self, position_seconds: f64) {
        let position = if position_seconds.is_nan() || position_seconds < 0.0 {
            0.0
        } else {
            position_seconds
        };
        match &self.active {
            ActivePath::Idle => debug!("seek ignored: nothing is playing"),
            ActivePath::Preferred { .. } => {
                if let Some(backend) = &self.preferred {
                    backend.seek(position);
                }
            }
            ActivePath::Mixer(_) => self.controls.post_seek(position),
        }
    }

    pub fn set_track_volume(&self, index: usize, volume: f32) {
        if let Some(controls) = self.mixer_track(index) {
            controls.set_volume(volume);
        } else if let Some(backend) = self.preferred_for(index) {
            backend.set_track_volume(index, clamp_volume(volume));
        }
    }

    pub fn set_track_pan(&self, index: usize, pan: f32) {
        if let Some(controls) = self.mixer_track(index) {
            controls.set_pan(pan);
        } else if let Some(backend) = self.preferred_for(index) {
            backend.set_track_pan(index, clamp_pan(pan));
        }
    }

    pub fn set_track_channel_select(&self, index: usize, channel_select: ChannelSelect) {
        if let Some(controls) = self.mixer_track(index) {
            controls.set_channel_select(channel_select);
        } else if let Some(backend) = self.preferred_for(index) {
            backend.set_track_channel_select(index, channel_select);
        }
    }

    /// Set the bus gain applied after summing. Kept across sessions.
    pub fn set_master_volume(&self, volume: f32) {
        self.controls.set_master_volume(volume);
        if let ActivePath::Preferred { .. } = self.active {
            if let Some(backend) = &self.preferred {
                backend.set_master_volume(self.controls.master_volume());
            }
        }
    }

    pub fn master_volume(&self) -> f32 {
        self.controls.master_volume()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Seconds of audio handed to the output since the session started or
    /// last seeked. Always 0 on a preferred backend.
    pub fn position_seconds(&self) -> f64 {
        match &self.active {
            ActivePath::Mixer(session) => {
                self.controls.position_frames() as f64 / f64::from(session.sample_rate)
            }
            _ => 0.0,
        }
    }

    /// Length of the longest track in the session.
    pub fn duration_seconds(&self) -> f64 {
        match &self.active {
            ActivePath::Idle => 0.0,
            ActivePath::Preferred { duration, .. } => *duration,
            ActivePath::Mixer(session) => session.duration,
        }
    }

    pub fn track_count(&self) -> usize {
        match &self.active {
            ActivePath::Idle => 0,
            ActivePath::Preferred { track_count, .. } => *track_count,
            ActivePath::Mixer(session) => session.tracks.len(),
        }
    }

    /// Name of the path the current session runs on, if any.
    pub fn active_backend(&self) -> Option<&str> {
        match &self.active {
            ActivePath::Idle => None,
            ActivePath::Preferred { .. } => self.preferred.as_ref().map(|backend| backend.name()),
            ActivePath::Mixer(_) => Some("mixer"),
        }
    }

    /// Block until the mixer worker exits, either because every track ended
    /// or because the session was stopped. Returns at once on a preferred
    /// backend or when idle.
    pub fn wait_until_finished(&mut self) {
        if let ActivePath::Mixer(session) = &mut self.active {
            if let Some(handle) = session.handle.take() {
                if handle.join().is_err() {
                    warn!("mixer thread panicked");
                }
            }
        }
    }

    pub fn settings(&self) -> MixerSettings {
        self.settings
    }

    /// Settings used by the next `start`.
    pub fn set_settings(&mut self, settings: MixerSettings) {
        self.settings = settings.sanitized();
    }

    pub fn set_chunk_bytes(&mut self, chunk_bytes: usize) {
        self.set_settings(MixerSettings {
            chunk_bytes,
            ..self.settings
        });
    }

    pub fn set_max_queued_chunks(&mut self, max_queued_chunks: usize) {
        self.settings.max_queued_chunks = max_queued_chunks;
    }

    pub fn set_stop_timeout_ms(&mut self, stop_timeout_ms: u64) {
        self.settings.stop_timeout_ms = stop_timeout_ms;
    }

    fn start_mixer(&mut self, tracks: &[TrackSpec]) -> Result<MixerSession, MixerError> {
        let settings = self.settings;
        let sources = open_sources(tracks, |spec| TrackSource::open(spec, settings.chunk_bytes))?;
        let engine = MixerEngine::new(sources, self.controls.clone())?;

        let track_controls = engine.track_controls();
        let sample_rate = engine.sample_rate();
        let duration = engine.duration_seconds();
        let abort = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel();

        let context = WorkerContext {
            engine,
            opener: self.opener.clone(),
            settings,
            abort: abort.clone(),
            alive: alive.clone(),
            state: self.state.clone(),
            ready: ready_tx,
        };
        let handle = thread::Builder::new()
            .name("wavdeck-mixer".to_string())
            .spawn(move || run_mixer_thread(context))
            .map_err(MixerError::WorkerSpawn)?;

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(SinkError::Unavailable(
                "mixer thread exited before opening the output".to_string(),
            ))
        });
        if let Err(err) = opened {
            let _ = handle.join();
            return Err(MixerError::OutputUnavailable(err));
        }

        debug!("mixer session started, {:.2}s long", duration);
        Ok(MixerSession {
            handle: Some(handle),
            abort,
            alive,
            tracks: track_controls,
            sample_rate,
            duration,
        })
    }

    fn halt(&mut self) {
        match std::mem::replace(&mut self.active, ActivePath::Idle) {
            ActivePath::Idle => {}
            ActivePath::Preferred { .. } => {
                set_state(&self.state, SessionState::Stopping);
                if let Some(backend) = self.preferred.as_mut() {
                    backend.stop();
                    info!("preview stopped on {}", backend.name());
                }
                set_state(&self.state, SessionState::Closed);
            }
            ActivePath::Mixer(session) => self.stop_mixer(session),
        }
    }

    fn stop_mixer(&mut self, mut session: MixerSession) {
        if self.state() != SessionState::Closed {
            set_state(&self.state, SessionState::Stopping);
        }
        session.abort.store(true, Ordering::SeqCst);

        if let Some(handle) = session.handle.take() {
            let deadline = Instant::now() + Duration::from_millis(self.settings.stop_timeout_ms);
            while session.alive.load(Ordering::SeqCst) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(STOP_POLL_MS));
            }

            if session.alive.load(Ordering::SeqCst) {
                warn!(
                    "mixer thread still running after {} ms, detaching it",
                    self.settings.stop_timeout_ms
                );
                self.lingering.push(handle);
            } else if handle.join().is_err() {
                warn!("mixer thread panicked");
            }
        }

        set_state(&self.state, SessionState::Closed);
    }

    fn join_lingering(&mut self) {
        for handle in self.lingering.drain(..) {
            debug!("waiting for a detached mixer thread");
            if handle.join().is_err() {
                warn!("mixer thread panicked");
            }
        }
    }

    fn mixer_track(&self, index: usize) -> Option<&Arc<TrackControls>> {
        match &self.active {
            ActivePath::Mixer(session) => session.tracks.get(index),
            _ => None,
        }
    }

    fn preferred_for(&self, index: usize) -> Option<&dyn PreviewBackend> {
        match &self.active {
            ActivePath::Preferred { track_count, .. } if index < *track_count => {
                self.preferred.as_deref()
            }
            _ => None,
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Validate every header and the shared sample rate, then open the playback
/// streams. A rejected session never opens a stream.
fn open_sources<R, F>(tracks: &[TrackSpec], mut open: F) -> Result<Vec<TrackSource<R>>, MixerError>
where
    F: FnMut(&TrackSpec) -> Result<TrackSource<R>, MixerError>,
{
    let headers = tracks
        .iter()
        .map(|spec| probe_header(spec).map(|header| (spec.path.as_path(), header.sample_rate)))
        .collect::<Result<Vec<_>, _>>()?;
    check_sample_rates(headers)?;
    tracks.iter().map(|spec| open(spec)).collect()
}

fn longest_duration(tracks: &[TrackSpec]) -> f64 {
    tracks
        .iter()
        .filter_map(|spec| open_header(&spec.path).ok())
        .map(|header| header.duration_seconds())
        .fold(0.0, f64::max)
}
