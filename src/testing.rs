//! Recording stand-ins for the player and the power switch.

use crate::error::{PlayerError, PowerError};
use crate::player::{PlaybackState, Player};
use crate::power::PowerControl;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SetVolume(u8),
}

#[derive(Debug, Clone)]
pub(crate) struct FakePlayer {
    state: Option<PlaybackState>,
    volume: Option<u8>,
    offline: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakePlayer {
    pub(crate) fn new(state: PlaybackState, volume: u8) -> Self {
        Self {
            state: Some(state),
            volume: Some(volume),
            offline: false,
            calls: Arc::default(),
        }
    }

    /// A player that has not reported anything and rejects every command.
    pub(crate) fn offline() -> Self {
        Self {
            state: None,
            volume: None,
            offline: true,
            calls: Arc::default(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn command(&self, call: Call) -> Result<(), PlayerError> {
        if self.offline {
            return Err(PlayerError::Disconnected);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Player for FakePlayer {
    fn playback_state(&self) -> Result<PlaybackState, PlayerError> {
        self.state.ok_or(PlayerError::NotReported("playback state"))
    }

    fn play(&self) -> Result<(), PlayerError> {
        self.command(Call::Play)
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.command(Call::Pause)
    }

    fn stop(&self) -> Result<(), PlayerError> {
        self.command(Call::Stop)
    }

    fn next(&self) -> Result<(), PlayerError> {
        self.command(Call::Next)
    }

    fn previous(&self) -> Result<(), PlayerError> {
        self.command(Call::Previous)
    }

    fn volume(&self) -> Result<u8, PlayerError> {
        self.volume.ok_or(PlayerError::NotReported("volume"))
    }

    fn set_volume(&self, volume: u8) -> Result<(), PlayerError> {
        self.command(Call::SetVolume(volume))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePower {
    power_offs: Arc<AtomicUsize>,
    failing: bool,
}

impl FakePower {
    /// Counts attempts but reports every one as failed.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn power_offs(&self) -> usize {
        self.power_offs.load(Ordering::SeqCst)
    }
}

impl PowerControl for FakePower {
    fn power_off(&self) -> Result<(), PowerError> {
        self.power_offs.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(PowerError::NoCommand);
        }
        Ok(())
    }
}
