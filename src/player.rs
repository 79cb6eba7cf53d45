use crate::error::PlayerError;

pub(crate) const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Playback control surface of the media player.
///
/// Calls are synchronous from the caller's point of view and may block.
pub(crate) trait Player {
    fn playback_state(&self) -> Result<PlaybackState, PlayerError>;
    fn play(&self) -> Result<(), PlayerError>;
    fn pause(&self) -> Result<(), PlayerError>;
    fn stop(&self) -> Result<(), PlayerError>;
    fn next(&self) -> Result<(), PlayerError>;
    fn previous(&self) -> Result<(), PlayerError>;
    /// Current volume in `0..=100`.
    fn volume(&self) -> Result<u8, PlayerError>;
    fn set_volume(&self, volume: u8) -> Result<(), PlayerError>;
}
