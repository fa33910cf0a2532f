//! MQTT level ingestion.
//!
//! Subscribes to the Venus OS tank topics and turns each publish into a
//! [`LevelUpdate`] pushed onto a bounded channel. The poll loop is the
//! single consumer; this thread never touches controller state directly.
//! Malformed payloads are dropped with a logged warning — the ingestion
//! path never propagates an error upward.

use std::sync::mpsc::{SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use serde_json::Value;

use crate::config::SystemConfig;
use crate::monitor::TankId;

/// One parsed level reading, still as the raw 0..1 fraction off the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelUpdate {
    pub tank: TankId,
    pub raw_value: f64,
}

/// Map a topic to its tank. Venus OS publishes the low tank on `tank/3`
/// and the high tank on `tank/4`.
pub fn parse_level_topic(topic: &str) -> Option<TankId> {
    if topic.contains("tank/3/Level") {
        Some(TankId::Low)
    } else if topic.contains("tank/4/Level") {
        Some(TankId::High)
    } else {
        None
    }
}

/// Parse a level payload: a JSON object `{"value": <fraction>}` or a bare
/// numeric string. Anything else is `None` (dropped by the caller).
pub fn parse_level_payload(payload: &[u8]) -> Option<f64> {
    if let Ok(v) = serde_json::from_slice::<Value>(payload) {
        if let Some(x) = v.get("value").and_then(Value::as_f64) {
            return Some(x);
        }
        if let Some(x) = v.as_f64() {
            return Some(x);
        }
    }
    std::str::from_utf8(payload).ok()?.trim().parse().ok()
}

/// Connect to the broker and feed updates into `tx` from a background
/// thread. Connection errors are logged and retried with a short backoff;
/// the thread lives for the life of the process.
pub fn spawn(config: &SystemConfig, tx: SyncSender<LevelUpdate>) -> JoinHandle<()> {
    let mut options = MqttOptions::new("pumphouse", &config.mqtt_broker, config.mqtt_port);
    options.set_keep_alive(Duration::from_secs(u64::from(config.mqtt_keepalive_s)));

    let topics = [
        format!("N/{}/tank/3/Level", config.victron_device_id),
        format!("N/{}/tank/4/Level", config.victron_device_id),
    ];

    let (client, mut connection) = Client::new(options, 10);

    thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt connected");
                    // Re-subscribe on every (re)connect — the broker may
                    // have lost the session.
                    for topic in &topics {
                        if let Err(e) = client.subscribe(topic.as_str(), QoS::AtMostOnce) {
                            warn!("subscribe {topic} failed: {e}");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    let Some(tank) = parse_level_topic(&p.topic) else {
                        continue;
                    };
                    let Some(raw_value) = parse_level_payload(&p.payload) else {
                        warn!("malformed level payload on {} — dropped", p.topic);
                        continue;
                    };
                    match tx.try_send(LevelUpdate { tank, raw_value }) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!("level queue full — update dropped");
                        }
                        Err(TrySendError::Disconnected(_)) => return, // shutting down
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("mqtt connection error: {e} — retrying");
                    thread::sleep(Duration::from_secs(2));
                }
            }
        }
    })
}
