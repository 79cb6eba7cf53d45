use crate::config::{PinSetting, Polarity};
use crate::dispatch::Dispatcher;
use crate::error::SetupError;
use crate::player::Player;
use crate::power::PowerControl;
use crate::presses::PressCounter;
use rppal::gpio::{Gpio, InputPin, Trigger};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Keeps the configured input pins and their interrupts alive.
///
/// Dropping it releases every pin.
pub(crate) struct ButtonHandler {
    _pins: Vec<InputPin>,
}

impl ButtonHandler {
    pub(crate) fn new<P, C>(
        gpio: &Gpio,
        settings: Vec<PinSetting>,
        counter: Arc<PressCounter>,
        dispatcher: Arc<Dispatcher<P, C>>,
    ) -> Result<Self, SetupError>
    where
        P: Player + Send + Sync + 'static,
        C: PowerControl + Send + Sync + 'static,
    {
        let mut pins = Vec::with_capacity(settings.len());

        for setting in settings {
            let pin_number = setting.pin;
            let pin_error = |source| SetupError::Pin {
                pin: pin_number,
                source,
            };

            let pin = gpio.get(pin_number).map_err(pin_error)?;
            let mut input = match setting.polarity {
                Polarity::ActiveHigh => pin.into_input_pulldown(),
                Polarity::ActiveLow => pin.into_input_pullup(),
            };

            let trigger = trigger(setting.polarity);
            let bouncetime = setting.bouncetime;
            info!(
                pin = pin_number,
                event = setting.event.as_str(),
                ?trigger,
                bouncetime_ms = bouncetime.as_millis() as u64,
                "Listening for presses"
            );

            let counter = counter.clone();
            let dispatcher = dispatcher.clone();
            input
                .set_async_interrupt(trigger, Some(bouncetime), move |_event| {
                    handle_press(&setting, Instant::now(), &counter, &dispatcher);
                })
                .map_err(pin_error)?;

            pins.push(input);
        }

        Ok(Self { _pins: pins })
    }
}

fn trigger(polarity: Polarity) -> Trigger {
    match polarity {
        Polarity::ActiveHigh => Trigger::RisingEdge,
        Polarity::ActiveLow => Trigger::FallingEdge,
    }
}

/// Counts a press and dispatches it. The counter lock is released before the
/// handler runs.
fn handle_press<P, C>(
    setting: &PinSetting,
    now: Instant,
    counter: &PressCounter,
    dispatcher: &Dispatcher<P, C>,
) -> u32
where
    P: Player,
    C: PowerControl,
{
    let count = counter.record(&setting.event, now);
    debug!(pin = setting.pin, event = setting.event.as_str(), count, "Got press");

    if let Err(e) = dispatcher.dispatch(setting, count) {
        error!(pin = setting.pin, "{}; check the pin configuration", e);
    }

    count
}
