use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid MQTT broker address {0:?}, expected host:port")]
    Address(String),
}

/// A single pin entry that could not be understood. These are skipped, never fatal.
#[derive(Debug, Error, PartialEq)]
pub(crate) enum EntryError {
    #[error("pin key {0:?} is not of the form bcmN")]
    PinKey(String),
    #[error("missing event name")]
    MissingEvent,
    #[error("unknown polarity {0:?}, expected active_high or active_low")]
    Polarity(String),
    #[error("invalid bouncetime {0:?}")]
    Bouncetime(String),
    #[error("invalid option {0:?}, expected key=value")]
    Option(String),
    #[error("{0}")]
    Table(String),
    #[error("BCM pin {0} is already configured")]
    Duplicate(u8),
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum DispatchError {
    #[error("could not find input handler for event {event:?}")]
    UnknownHandler { event: String },
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum PlayerError {
    #[error("player has not reported its {0} yet")]
    NotReported(&'static str),
    #[error("too many player requests in flight")]
    Busy,
    #[error("player connection is closed")]
    Disconnected,
}

#[derive(Debug, Error)]
pub(crate) enum PowerError {
    #[error("no power off command configured")]
    NoCommand,
    #[error("failed to run power off command: {0}")]
    Spawn(#[from] io::Error),
    #[error("power off command exited with {0}")]
    Failed(ExitStatus),
}

#[derive(Debug, Error)]
pub(crate) enum SetupError {
    #[error("GPIO unavailable: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("failed to configure BCM pin {pin}: {source}")]
    Pin {
        pin: u8,
        source: rppal::gpio::Error,
    },
}
