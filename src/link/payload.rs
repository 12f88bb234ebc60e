//! JSON bodies for the orchestrator endpoints.
//!
//! | Path         | Body                                          |
//! |--------------|-----------------------------------------------|
//! | `/connect`   | `{"id","ip","port"}`                          |
//! | `/heartbeat` | `{"arduinoId"}`                               |
//! | `/dispatch`  | `{"arduinoId","event","data":{..variant..}}`  |
//!
//! Channel numbers on the wire are 1-based.

use serde::Serialize;

use crate::config::Variant;
use crate::error::CommsError;
use crate::sensors::ChannelValue;

pub const CONNECT_PATH: &str = "/connect";
pub const HEARTBEAT_PATH: &str = "/heartbeat";
pub const DISPATCH_PATH: &str = "/dispatch";

#[derive(Debug, Serialize)]
pub struct ConnectPayload<'a> {
    pub id: &'a str,
    pub ip: &'a str,
    pub port: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload<'a> {
    pub arduino_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload<'a> {
    pub arduino_id: &'a str,
    pub event: &'a str,
    pub data: DispatchData,
}

// ───────────────────────────────────────────────────────────────
// Variant data
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonEntry {
    pub id: usize,
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonData {
    pub buttons: Vec<ButtonEntry>,
    /// 0 when nothing has changed yet.
    pub last_pressed: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionEntry {
    pub from: usize,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub connections: Vec<ConnectionEntry>,
    pub total_connections: usize,
    pub correct_connections: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PressData {
    pub total_connections: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeEntry {
    pub id: String,
    /// Tag identifier, empty when the slot is vacant.
    pub name: String,
    pub slot: usize,
    pub detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeData {
    pub badges: Vec<BadgeEntry>,
    pub total_badges: usize,
    pub detected_badges: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchData {
    Buttons(ButtonData),
    Connections(ConnectionData),
    Presses(PressData),
    Badges(BadgeData),
}

impl DispatchData {
    /// Build the variant's `data` object from the current snapshot.
    pub fn from_snapshot(
        variant: Variant,
        snapshot: &[ChannelValue],
        last_changed: Option<usize>,
        completed: bool,
    ) -> Self {
        let total = snapshot.len();
        match variant {
            Variant::ButtonPanel => Self::Buttons(ButtonData {
                buttons: snapshot
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ButtonEntry {
                        id: i + 1,
                        pressed: v.is_on(),
                    })
                    .collect(),
                last_pressed: last_changed.filter(|&i| i < total).map_or(0, |i| i + 1),
                completed,
            }),
            Variant::CablePanel => {
                let connections: Vec<_> = snapshot
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ConnectionEntry {
                        from: i + 1,
                        connected: v.is_on(),
                    })
                    .collect();
                let correct = connections.iter().filter(|c| c.connected).count();
                Self::Connections(ConnectionData {
                    connections,
                    total_connections: total,
                    correct_connections: correct,
                    completed,
                })
            }
            Variant::SimultaneousPress => Self::Presses(PressData {
                total_connections: total,
                completed,
            }),
            Variant::TagReader => {
                let badges: Vec<_> = snapshot
                    .iter()
                    .enumerate()
                    .map(|(i, v)| BadgeEntry {
                        id: format!("Lector{}", i + 1),
                        name: v.tag().unwrap_or("").to_string(),
                        slot: i + 1,
                        detected: v.is_on(),
                    })
                    .collect();
                let detected = badges.iter().filter(|b| b.detected).count();
                Self::Badges(BadgeData {
                    badges,
                    total_badges: total,
                    detected_badges: detected,
                    completed,
                })
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CommsError> {
    serde_json::to_string(value).map_err(|_| CommsError::Encode)
}

pub fn connect_body(device_id: &str, ip: &str, port: u16) -> Result<String, CommsError> {
    to_json(&ConnectPayload {
        id: device_id,
        ip,
        port,
    })
}

pub fn heartbeat_body(device_id: &str) -> Result<String, CommsError> {
    to_json(&HeartbeatPayload {
        arduino_id: device_id,
    })
}

pub fn dispatch_body(device_id: &str, event: &str, data: DispatchData) -> Result<String, CommsError> {
    to_json(&DispatchPayload {
        arduino_id: device_id,
        event,
        data,
    })
}
