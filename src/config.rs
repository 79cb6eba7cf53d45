use crate::error::{ConfigError, EntryError};
use crate::presses::DEFAULT_BURST_WINDOW;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::Duration;
use toml::Value;
use tracing::{debug, warn};

const PIN_PREFIX: &str = "bcm";
const DEFAULT_BOUNCETIME_MS: u64 = 50;

pub(crate) type OptionMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Default for Polarity {
    fn default() -> Self {
        Polarity::ActiveLow
    }
}

impl std::str::FromStr for Polarity {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active_high" => Ok(Polarity::ActiveHigh),
            "active_low" => Ok(Polarity::ActiveLow),
            other => Err(EntryError::Polarity(other.to_owned())),
        }
    }
}

/// Settings for one configured input pin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PinSetting {
    /// BCM pin number.
    pub(crate) pin: u8,
    pub(crate) event: String,
    pub(crate) polarity: Polarity,
    pub(crate) bouncetime: Duration,
    pub(crate) options: OptionMap,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct MqttSettings {
    pub(crate) address: String,
    pub(crate) client_id: String,
    pub(crate) topic_prefix: String,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:1883".to_owned(),
            client_id: "button-remote".to_owned(),
            topic_prefix: "mopidy".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct PowerSettings {
    pub(crate) command: Vec<String>,
}

impl Default for PowerSettings {
    fn default() -> Self {
        Self {
            command: ["sudo", "shutdown", "-h", "now"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) burst_window: Duration,
    pub(crate) mqtt: MqttSettings,
    pub(crate) power: PowerSettings,
    pub(crate) pins: Vec<PinSetting>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    burst_window_ms: Option<u64>,
    #[serde(default)]
    mqtt: MqttSettings,
    #[serde(default)]
    power: PowerSettings,
    #[serde(default)]
    pins: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PinEntry {
    event: String,
    #[serde(default)]
    active: Polarity,
    #[serde(default = "default_bouncetime")]
    bouncetime: u64,
    #[serde(default)]
    options: BTreeMap<String, Value>,
}

fn default_bouncetime() -> u64 {
    DEFAULT_BOUNCETIME_MS
}

impl Config {
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;

        Self::from_toml(&contents)
    }

    pub(crate) fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;

        Ok(Self {
            burst_window: raw
                .burst_window_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BURST_WINDOW),
            mqtt: raw.mqtt,
            power: raw.power,
            pins: pin_table(raw.pins),
        })
    }
}

/// Builds the pin table, skipping null and malformed entries individually.
fn pin_table(entries: BTreeMap<String, Value>) -> Vec<PinSetting> {
    let mut pins: Vec<PinSetting> = Vec::new();

    for (key, value) in entries {
        if !key.starts_with(PIN_PREFIX) {
            debug!(key = key.as_str(), "ignoring non-pin key");
            continue;
        }

        match pin_setting(&key, value) {
            Ok(Some(setting)) if pins.iter().any(|p| p.pin == setting.pin) => {
                warn!(key = key.as_str(), "skipping pin: {}", EntryError::Duplicate(setting.pin));
            }
            Ok(Some(setting)) => pins.push(setting),
            Ok(None) => debug!(key = key.as_str(), "pin entry is empty, not configuring it"),
            Err(e) => warn!(key = key.as_str(), "skipping malformed pin entry: {}", e),
        }
    }

    pins
}

fn pin_setting(key: &str, value: Value) -> Result<Option<PinSetting>, EntryError> {
    let pin = key[PIN_PREFIX.len()..]
        .parse::<u8>()
        .map_err(|_| EntryError::PinKey(key.to_owned()))?;

    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_compact(pin, &s).map(Some),
        Value::Table(t) if t.is_empty() => Ok(None),
        table @ Value::Table(_) => {
            let entry: PinEntry = table
                .try_into()
                .map_err(|e: toml::de::Error| EntryError::Table(e.to_string()))?;
            if entry.event.trim().is_empty() {
                return Err(EntryError::MissingEvent);
            }

            Ok(Some(PinSetting {
                pin,
                event: entry.event,
                polarity: entry.active,
                bouncetime: Duration::from_millis(entry.bouncetime),
                options: entry
                    .options
                    .into_iter()
                    .map(|(k, v)| (k, option_value(v)))
                    .collect(),
            }))
        }
        other => Err(EntryError::Table(format!(
            "expected a table or string, found {}",
            other.type_str()
        ))),
    }
}

/// Parses the `event,active,bouncetime[,key=value...]` shorthand.
fn parse_compact(pin: u8, entry: &str) -> Result<PinSetting, EntryError> {
    let mut fields = entry.split(',').map(str::trim);

    let event = match fields.next() {
        Some(event) if !event.is_empty() => event.to_owned(),
        _ => return Err(EntryError::MissingEvent),
    };
    let polarity = match fields.next() {
        Some(active) if !active.is_empty() => active.parse()?,
        _ => Polarity::default(),
    };
    let bouncetime = match fields.next() {
        Some(ms) if !ms.is_empty() => ms
            .parse()
            .map_err(|_| EntryError::Bouncetime(ms.to_owned()))?,
        _ => DEFAULT_BOUNCETIME_MS,
    };

    let mut options = OptionMap::new();
    for option in fields.filter(|f| !f.is_empty()) {
        let mut parts = option.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(k), Some(v)) if !k.trim().is_empty() => {
                options.insert(k.trim().to_owned(), v.trim().to_owned());
            }
            _ => return Err(EntryError::Option(option.to_owned())),
        }
    }

    Ok(PinSetting {
        pin,
        event,
        polarity,
        bouncetime: Duration::from_millis(bouncetime),
        options,
    })
}

fn option_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pins(toml: &str) -> Vec<PinSetting> {
        Config::from_toml(toml).unwrap().pins
    }

    #[test]
    fn defaults_when_sections_missing() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.burst_window, Duration::from_millis(200));
        assert_eq!(config.mqtt, MqttSettings::default());
        assert_eq!(config.power.command, vec!["sudo", "shutdown", "-h", "now"]);
        assert!(config.pins.is_empty());
    }

    #[test]
    fn burst_window_is_separate_from_bouncetime() {
        let config = Config::from_toml(
            r#"
            burst_window_ms = 350

            [pins]
            bcm5 = { event = "next", bouncetime = 20 }
            "#,
        )
        .unwrap();

        assert_eq!(config.burst_window, Duration::from_millis(350));
        assert_eq!(config.pins[0].bouncetime, Duration::from_millis(20));
    }

    #[test]
    fn table_entry() {
        let pins = pins(
            r#"
            [pins.bcm6]
            event = "volume_up"
            active = "active_high"
            bouncetime = 150
            options = { step = 10 }
            "#,
        );

        assert_eq!(
            pins,
            vec![PinSetting {
                pin: 6,
                event: "volume_up".to_owned(),
                polarity: Polarity::ActiveHigh,
                bouncetime: Duration::from_millis(150),
                options: vec![("step".to_owned(), "10".to_owned())].into_iter().collect(),
            }]
        );
    }

    #[test]
    fn table_entry_defaults() {
        let pins = pins(
            r#"
            [pins]
            bcm17 = { event = "play_pause" }
            "#,
        );

        assert_eq!(pins[0].polarity, Polarity::ActiveLow);
        assert_eq!(pins[0].bouncetime, Duration::from_millis(50));
        assert!(pins[0].options.is_empty());
    }

    #[test]
    fn compact_entry() {
        let pins = pins(
            r#"
            [pins]
            bcm13 = "volume_down, active_high, 250, step=3"
            "#,
        );

        assert_eq!(pins[0].pin, 13);
        assert_eq!(pins[0].event, "volume_down");
        assert_eq!(pins[0].polarity, Polarity::ActiveHigh);
        assert_eq!(pins[0].bouncetime, Duration::from_millis(250));
        assert_eq!(pins[0].options.get("step").map(String::as_str), Some("3"));
    }

    #[test]
    fn compact_entry_with_event_only() {
        let setting = parse_compact(4, "next").unwrap();

        assert_eq!(setting.event, "next");
        assert_eq!(setting.polarity, Polarity::ActiveLow);
        assert_eq!(setting.bouncetime, Duration::from_millis(50));
    }

    #[test]
    fn compact_entry_errors() {
        assert_eq!(parse_compact(4, ",active_low"), Err(EntryError::MissingEvent));
        assert_eq!(
            parse_compact(4, "next,sideways"),
            Err(EntryError::Polarity("sideways".to_owned()))
        );
        assert_eq!(
            parse_compact(4, "next,active_low,soon"),
            Err(EntryError::Bouncetime("soon".to_owned()))
        );
        assert_eq!(
            parse_compact(4, "next,active_low,10,step"),
            Err(EntryError::Option("step".to_owned()))
        );
    }

    #[test]
    fn null_and_malformed_entries_are_skipped() {
        let pins = pins(
            r#"
            [pins]
            bcm2 = ""
            bcm3 = {}
            bcm4 = "next,sideways,10"
            bcm5 = { active = "active_low" }
            bcm6 = 42
            bcmX = "prev"
            bcm7 = { event = "prev", colour = "red" }
            bcm8 = "play_stop"
            "#,
        );

        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].pin, 8);
        assert_eq!(pins[0].event, "play_stop");
    }

    #[test]
    fn non_pin_keys_are_ignored() {
        let pins = pins(
            r#"
            [pins]
            enabled = true
            bcm9 = "next"
            "#,
        );

        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].pin, 9);
    }

    #[test]
    fn duplicate_pin_keeps_first() {
        let pins = pins(
            r#"
            [pins]
            bcm05 = "next"
            bcm5 = "prev"
            "#,
        );

        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].event, "next");
    }

    #[test]
    fn unknown_event_names_are_kept_for_dispatch() {
        let pins = pins(
            r#"
            [pins]
            bcm10 = "self_destruct"
            "#,
        );

        assert_eq!(pins[0].event, "self_destruct");
    }

    #[test]
    fn sections() {
        let config = Config::from_toml(
            r#"
            [mqtt]
            address = "192.168.1.25:1883"
            topic_prefix = "livingroom"

            [power]
            command = ["systemctl", "poweroff"]
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.address, "192.168.1.25:1883");
        assert_eq!(config.mqtt.client_id, "button-remote");
        assert_eq!(config.mqtt.topic_prefix, "livingroom");
        assert_eq!(config.power.command, vec!["systemctl", "poweroff"]);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml("[pins"),
            Err(ConfigError::Parse(_))
        ));
    }
}
