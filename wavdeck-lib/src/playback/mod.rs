//! Mixer sessions: track sources, the mix cycle, output sinks and transport.

pub mod engine;
pub mod settings;
pub mod sink;
pub mod track;
pub mod transport;

pub use engine::{CycleOutcome, MixControls, MixerEngine, RunOutcome};
pub use settings::MixerSettings;
pub use sink::{default_output, OutputConfig, OutputSink, RodioSink, SinkOpener};
pub use track::{TrackControls, TrackSource, TrackSpec};
pub use transport::{PreviewBackend, SessionState, Transport};
