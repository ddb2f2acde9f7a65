//! Optional preferred output path tried before the portable mixer.

use crate::dsp::ChannelSelect;
use crate::error::MixerError;
use crate::playback::track::TrackSpec;

/// A playback path that can preview a set of tracks on its own, typically a
/// platform-native multi-stream output.
///
/// [`Transport`](super::Transport) calls `start` first when a backend is
/// installed and falls back to the software mixer if it fails. Control calls
/// receive values that are already clamped, and indices that are in range.
pub trait PreviewBackend: Send + Sync {
    fn start(&mut self, tracks: &[TrackSpec]) -> Result<(), MixerError>;

    /// Stop playback and release the backend's resources. Must be idempotent.
    fn stop(&mut self);

    fn seek(&self, position_seconds: f64);

    fn set_track_volume(&self, index: usize, volume: f32);

    fn set_track_pan(&self, index: usize, pan: f32);

    fn set_track_channel_select(&self, index: usize, channel_select: ChannelSelect);

    fn set_master_volume(&self, volume: f32);

    /// Short name used in log lines.
    fn name(&self) -> &str;
}
