//! Tunables for a mixer session.

use serde::{Deserialize, Serialize};

const DEFAULT_CHUNK_BYTES: usize = 4096;
const MIN_CHUNK_BYTES: usize = 64;
const DEFAULT_MAX_QUEUED_CHUNKS: usize = 4;
const DEFAULT_STOP_TIMEOUT_MS: u64 = 2000;
const DEFAULT_SINK_OPEN_RETRIES: usize = 20;
const DEFAULT_SINK_OPEN_RETRY_MS: u64 = 100;

/// Serialized configuration for mixer sessions.
///
/// Missing JSON fields fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    /// Bytes read from each track per mix cycle.
    pub chunk_bytes: usize,
    /// Chunks the output sink may hold before `write` blocks. `0` disables the guard.
    pub max_queued_chunks: usize,
    /// Upper bound on how long `stop()` waits for the mixer thread.
    pub stop_timeout_ms: u64,
    /// Attempts at opening the default output stream.
    pub sink_open_retries: usize,
    pub sink_open_retry_ms: u64,
}

impl MixerSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Copy with every field forced into its valid range.
    pub fn sanitized(mut self) -> Self {
        self.chunk_bytes = self.chunk_bytes.max(MIN_CHUNK_BYTES);
        self.sink_open_retries = self.sink_open_retries.max(1);
        self
    }
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_queued_chunks: DEFAULT_MAX_QUEUED_CHUNKS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            sink_open_retries: DEFAULT_SINK_OPEN_RETRIES,
            sink_open_retry_ms: DEFAULT_SINK_OPEN_RETRY_MS,
        }
    }
}
