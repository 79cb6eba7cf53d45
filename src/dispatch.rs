use crate::config::{OptionMap, PinSetting};
use crate::error::{DispatchError, PlayerError};
use crate::player::{PlaybackState, Player, MAX_VOLUME};
use crate::power::PowerControl;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

const DEFAULT_VOLUME_STEP: i64 = 5;
const SHUTDOWN_PRESSES: u32 = 2;

/// Every event a pin can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    PlayPause,
    PlayStop,
    Next,
    Prev,
    VolumeUp,
    VolumeDown,
}

impl FromStr for Event {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "play_pause" => Ok(Event::PlayPause),
            "play_stop" => Ok(Event::PlayStop),
            "next" => Ok(Event::Next),
            "prev" => Ok(Event::Prev),
            "volume_up" => Ok(Event::VolumeUp),
            "volume_down" => Ok(Event::VolumeDown),
            other => Err(DispatchError::UnknownHandler {
                event: other.to_owned(),
            }),
        }
    }
}

/// Routes counted presses to the player.
///
/// Once a double press of `play_pause` has powered the machine off, every
/// later press is dropped. A failed power off leaves the dispatcher running.
pub(crate) struct Dispatcher<P, C> {
    player: P,
    power: C,
    halted: AtomicBool,
}

impl<P, C> Dispatcher<P, C>
where
    P: Player,
    C: PowerControl,
{
    pub(crate) fn new(player: P, power: C) -> Self {
        Self {
            player,
            power,
            halted: AtomicBool::new(false),
        }
    }

    /// Runs the handler for `setting.event` once.
    ///
    /// Player failures are logged here and do not make dispatch fail; only an
    /// event with no handler is an error.
    pub(crate) fn dispatch(&self, setting: &PinSetting, count: u32) -> Result<(), DispatchError> {
        if self.halted.load(Ordering::SeqCst) {
            debug!(pin = setting.pin, event = setting.event.as_str(), "powering off, press ignored");
            return Ok(());
        }

        let event: Event = setting.event.parse()?;
        debug!(pin = setting.pin, ?event, count, "dispatching");

        if let Err(e) = self.handle(event, &setting.options, count) {
            error!(pin = setting.pin, ?event, "player command failed: {}", e);
        }

        Ok(())
    }

    fn handle(&self, event: Event, options: &OptionMap, count: u32) -> Result<(), PlayerError> {
        match event {
            Event::PlayPause => self.play_pause(count),
            Event::PlayStop => self.play_stop(),
            Event::Next => self.player.next(),
            Event::Prev => self.player.previous(),
            Event::VolumeUp => self.change_volume(volume_step(options)),
            Event::VolumeDown => self.change_volume(volume_step(options).saturating_neg()),
        }
    }

    fn play_pause(&self, count: u32) -> Result<(), PlayerError> {
        if count == SHUTDOWN_PRESSES {
            match self.power.power_off() {
                Ok(()) => self.halted.store(true, Ordering::SeqCst),
                Err(e) => error!("power off failed, still listening: {}", e),
            }
            return Ok(());
        }

        if self.player.playback_state()? == PlaybackState::Playing {
            self.player.pause()
        } else {
            self.player.play()
        }
    }

    fn play_stop(&self) -> Result<(), PlayerError> {
        if self.player.playback_state()? == PlaybackState::Playing {
            self.player.stop()
        } else {
            self.player.play()
        }
    }

    fn change_volume(&self, delta: i64) -> Result<(), PlayerError> {
        let current = self.player.volume()?;
        let volume = i64::from(current)
            .saturating_add(delta)
            .max(0)
            .min(i64::from(MAX_VOLUME)) as u8;

        info!(from = current, to = volume, "setting volume");
        self.player.set_volume(volume)
    }
}

fn volume_step(options: &OptionMap) -> i64 {
    match options.get("step") {
        None => DEFAULT_VOLUME_STEP,
        Some(step) => step.trim().parse().unwrap_or_else(|_| {
            warn!(step = step.as_str(), "volume step is not an integer, using {}", DEFAULT_VOLUME_STEP);
            DEFAULT_VOLUME_STEP
        }),
    }
}
