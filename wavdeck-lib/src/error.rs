//! Error types shared across the parser, mixer and output layers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Rejection raised while parsing a RIFF/WAVE header.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("not a RIFF/WAVE file")]
    NotRiffWave,
    #[error("unsupported encoding: format tag {format_tag}, {bits_per_sample} bits per sample")]
    UnsupportedEncoding { format_tag: u16, bits_per_sample: u16 },
    #[error("malformed container: {0}")]
    MalformedContainer(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Failure reported by an [`OutputSink`](crate::playback::OutputSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output unavailable: {0}")]
    Unavailable(String),
    #[error("output write failed: {0}")]
    Write(String),
}

/// Session start failure. A session that fails with one of these never runs.
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("no tracks given")]
    EmptyTrackList,
    #[error("sample rate mismatch: {path:?} is {found} Hz, session is {expected} Hz")]
    SampleRateMismatch {
        expected: u32,
        found: u32,
        path: PathBuf,
    },
    #[error("failed to open {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path:?}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error(transparent)]
    OutputUnavailable(#[from] SinkError),
    #[error("preferred backend failed: {0}")]
    BackendFailed(String),
    #[error("failed to spawn mixer thread: {0}")]
    WorkerSpawn(#[source] io::Error),
}
