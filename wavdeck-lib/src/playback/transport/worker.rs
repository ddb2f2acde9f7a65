//! Mixer worker thread: opens the sink, runs the cycle, tears down.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use log::{error, info, warn};

use crate::error::SinkError;
use crate::playback::engine::{MixerEngine, RunOutcome};
use crate::playback::settings::MixerSettings;
use crate::playback::sink::{OutputConfig, SinkOpener, OUTPUT_CHANNELS};

use super::{set_state, SessionState};

/// Everything a worker owns or shares for one session.
pub(super) struct WorkerContext {
    pub(super) engine: MixerEngine<BufReader<File>>,
    pub(super) opener: SinkOpener,
    pub(super) settings: MixerSettings,
    pub(super) abort: Arc<AtomicBool>,
    pub(super) alive: Arc<AtomicBool>,
    pub(super) state: Arc<Mutex<SessionState>>,
    /// Reports whether the sink opened; sent exactly once.
    pub(super) ready: Sender<Result<(), SinkError>>,
}

/// Publishes the end of a session however the worker exits, unwinds
/// included: the state goes to `Closed`, then `alive` drops to false.
struct SessionExit {
    alive: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionExit {
    fn new(alive: Arc<AtomicBool>, state: Arc<Mutex<SessionState>>) -> Self {
        alive.store(true, Ordering::SeqCst);
        Self { alive, state }
    }
}

impl Drop for SessionExit {
    fn drop(&mut self) {
        // The lock may be poisoned if a control call panicked mid-update.
        match self.state.lock() {
            Ok(mut state) => *state = SessionState::Closed,
            Err(poisoned) => *poisoned.into_inner() = SessionState::Closed,
        }
        self.alive.store(false, Ordering::SeqCst);
    }
}

pub(super) fn run_mixer_thread(ctx: WorkerContext) {
    let WorkerContext {
        mut engine,
        opener,
        settings,
        abort,
        alive,
        state,
        ready,
    } = ctx;
    let _exit = SessionExit::new(alive, state.clone());

    let config = OutputConfig {
        sample_rate: engine.sample_rate(),
        channels: OUTPUT_CHANNELS,
        stop: abort.clone(),
        settings,
    };
    let mut sink = match opener(&config) {
        Ok(sink) => sink,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    set_state(&state, SessionState::Running);
    let _ = ready.send(Ok(()));
    info!(
        "mixer session running: {} tracks at {} Hz",
        engine.tracks().len(),
        engine.sample_rate()
    );

    let outcome = engine.run(sink.as_mut(), &abort);
    drop(engine);
    match outcome {
        Ok(RunOutcome::Finished) => {
            info!("all tracks ended, draining output");
            // Still `Running` here: callers polling the state wait for the tail.
            if let Err(err) = sink.drain() {
                warn!("failed to drain output: {}", err);
            }
        }
        Ok(RunOutcome::Stopped) => info!("mixer session stopped"),
        Err(err) => error!("output write failed, ending session: {}", err),
    }
    set_state(&state, SessionState::Stopping);
}
