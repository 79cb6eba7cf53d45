use crate::config::MqttSettings;
use crate::error::{ConfigError, PlayerError};
use crate::player::{PlaybackState, Player, MAX_VOLUME};
use futures::stream::StreamExt;
use rumq_client::{eventloop, MqttOptions, Notification, Publish, QoS, Request, Subscribe};
use std::env;
use std::str;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::time;
use tracing::{debug, error, info, warn};

const REQUEST_CAPACITY: usize = 10;
const KEEP_ALIVE_SECS: u16 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Topic layout of the player's MQTT bridge: commands under `<prefix>/c`,
/// reported state under `<prefix>/i`.
#[derive(Debug, Clone, PartialEq)]
struct Topics {
    playback: String,
    volume: String,
    state_info: String,
    volume_info: String,
}

impl Topics {
    fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            playback: format!("{}/c/plb", prefix),
            volume: format!("{}/c/vol", prefix),
            state_info: format!("{}/i/sta", prefix),
            volume_info: format!("{}/i/vol", prefix),
        }
    }
}

/// Last values the player published about itself.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Reported {
    state: Option<PlaybackState>,
    volume: Option<u8>,
}

impl Reported {
    fn update(&mut self, topics: &Topics, topic: &str, payload: &[u8]) {
        if topic == topics.state_info {
            match parse_state(payload) {
                Some(state) => self.state = Some(state),
                None => warn!(topic, "unrecognized playback state {:?}", String::from_utf8_lossy(payload)),
            }
        } else if topic == topics.volume_info {
            match parse_volume(payload) {
                Some(volume) => self.volume = Some(volume),
                None => warn!(topic, "unrecognized volume {:?}", String::from_utf8_lossy(payload)),
            }
        } else {
            debug!(topic, "ignoring message");
        }
    }
}

fn parse_state(payload: &[u8]) -> Option<PlaybackState> {
    match str::from_utf8(payload).ok()?.trim() {
        "playing" => Some(PlaybackState::Playing),
        "paused" => Some(PlaybackState::Paused),
        "stopped" => Some(PlaybackState::Stopped),
        _ => None,
    }
}

fn parse_volume(payload: &[u8]) -> Option<u8> {
    let volume: i64 = str::from_utf8(payload).ok()?.trim().parse().ok()?;

    Some(volume.max(0).min(i64::from(MAX_VOLUME)) as u8)
}

fn parse_address(address: &str) -> Option<(String, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }

    Some((host.to_owned(), port.parse().ok()?))
}

/// Player reached through its MQTT bridge.
///
/// Commands are queued for the event loop without waiting for the broker;
/// queries answer from the values the player last reported.
#[derive(Clone)]
pub(crate) struct MqttPlayer {
    requests: Sender<Request>,
    reported: Arc<Mutex<Reported>>,
    topics: Topics,
}

/// Starts the MQTT event loop on the current runtime.
pub(crate) fn connect(settings: &MqttSettings) -> Result<MqttPlayer, ConfigError> {
    let (host, port) = parse_address(&settings.address)
        .ok_or_else(|| ConfigError::Address(settings.address.clone()))?;
    let mut mqtt_options = MqttOptions::new(settings.client_id.as_str(), host, port);
    mqtt_options
        .set_clean_session(true)
        .set_keep_alive(KEEP_ALIVE_SECS);
    if let (Ok(user), Ok(password)) = (env::var("MQTT_USER"), env::var("MQTT_PASSWORD")) {
        mqtt_options.set_credentials(user, password);
    }

    let (requests_tx, requests_rx) = channel(REQUEST_CAPACITY);
    let reported = Arc::new(Mutex::new(Reported::default()));
    let topics = Topics::new(&settings.topic_prefix);

    tokio::spawn(reconnect_loop(
        mqtt_options,
        requests_tx.clone(),
        requests_rx,
        topics.clone(),
        reported.clone(),
    ));

    Ok(MqttPlayer {
        requests: requests_tx,
        reported,
        topics,
    })
}

async fn reconnect_loop(
    mqtt_options: MqttOptions,
    requests_tx: Sender<Request>,
    requests_rx: Receiver<Request>,
    topics: Topics,
    reported: Arc<Mutex<Reported>>,
) {
    let mut event_loop = eventloop(mqtt_options, requests_rx);

    loop {
        match event_loop.connect().await {
            Ok(mut stream) => {
                info!("Connected to broker");
                let mut requests_tx = requests_tx.clone();
                let subscriptions = vec![topics.state_info.clone(), topics.volume_info.clone()];
                tokio::spawn(async move {
                    for topic in subscriptions {
                        let subscription = Subscribe::new(topic, QoS::AtLeastOnce);
                        if requests_tx.send(subscription.into()).await.is_err() {
                            break;
                        }
                    }
                });

                while let Some(item) = stream.next().await {
                    if let Notification::Publish(publish) = item {
                        lock(&reported).update(&topics, &publish.topic_name, &publish.payload[..]);
                    }
                }
            }
            Err(e) => error!("Got error trying to connect: {}", e),
        };

        time::delay_for(RECONNECT_DELAY).await;
        info!("Attempting to reconnect MQTT");
    }
}

fn lock(reported: &Mutex<Reported>) -> MutexGuard<'_, Reported> {
    reported
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MqttPlayer {
    fn publish(&self, topic: &str, payload: String) -> Result<(), PlayerError> {
        let publish = Publish::new(topic, QoS::AtLeastOnce, payload.into_bytes());

        self.requests
            .clone()
            .try_send(Request::Publish(publish))
            .map_err(|e| match e {
                TrySendError::Full(_) => PlayerError::Busy,
                TrySendError::Closed(_) => PlayerError::Disconnected,
            })
    }

    fn playback(&self, command: &str) -> Result<(), PlayerError> {
        self.publish(&self.topics.playback, command.to_owned())
    }

    /// Sends a command and assumes the state it leads to until the player reports otherwise.
    fn transition(&self, command: &str, state: PlaybackState) -> Result<(), PlayerError> {
        self.playback(command)?;
        lock(&self.reported).state = Some(state);

        Ok(())
    }
}

impl Player for MqttPlayer {
    fn playback_state(&self) -> Result<PlaybackState, PlayerError> {
        lock(&self.reported)
            .state
            .ok_or(PlayerError::NotReported("playback state"))
    }

    fn play(&self) -> Result<(), PlayerError> {
        self.transition("play", PlaybackState::Playing)
    }

    fn pause(&self) -> Result<(), PlayerError> {
        self.transition("pause", PlaybackState::Paused)
    }

    fn stop(&self) -> Result<(), PlayerError> {
        self.transition("stop", PlaybackState::Stopped)
    }

    fn next(&self) -> Result<(), PlayerError> {
        self.playback("next")
    }

    fn previous(&self) -> Result<(), PlayerError> {
        self.playback("prev")
    }

    fn volume(&self) -> Result<u8, PlayerError> {
        lock(&self.reported)
            .volume
            .ok_or(PlayerError::NotReported("volume"))
    }

    fn set_volume(&self, volume: u8) -> Result<(), PlayerError> {
        let volume = volume.min(MAX_VOLUME);
        self.publish(&self.topics.volume, format!("={}", volume))?;

        // Quick repeated presses build on the requested level, not a stale report.
        lock(&self.reported).volume = Some(volume);

        Ok(())
    }
}
