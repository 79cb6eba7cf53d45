use rppal::gpio::Gpio;
use std::env;
use std::error::Error;
use std::io;
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{Signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod buttons;
mod client;
mod config;
mod dispatch;
mod error;
mod player;
mod power;
mod presses;
#[cfg(test)]
mod testing;

use buttons::ButtonHandler;
use config::Config;
use dispatch::Dispatcher;
use error::SetupError;
use power::SystemPower;
use presses::PressCounter;

const CONFIG_ENV: &str = "BUTTON_REMOTE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "/etc/button-remote.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config = Config::load(&path)?;
    info!(path = path.as_str(), pins = config.pins.len(), "Loaded configuration");
    if config.pins.is_empty() {
        warn!("No pins configured, nothing to listen for");
    }

    let player = client::connect(&config.mqtt)?;
    let dispatcher = Arc::new(Dispatcher::new(
        player,
        SystemPower::new(config.power.command),
    ));
    let counter = Arc::new(PressCounter::new(config.burst_window));

    let terminate = signal::unix::signal(SignalKind::terminate())?;
    let gpio = Gpio::new().map_err(SetupError::from)?;
    let buttons = ButtonHandler::new(&gpio, config.pins, counter, dispatcher)?;

    let reason = wait_for_stop(terminate).await?;
    info!(signal = reason, "Shutting down");
    drop(buttons);

    Ok(())
}

/// Resolves on Ctrl-C or on the given SIGTERM stream, naming which one arrived.
async fn wait_for_stop(mut terminate: Signal) -> io::Result<&'static str> {
    tokio::select! {
        result = signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
