//! Wire protocol shared by the dot broadcast server and its clients.
//!
//! Every WebSocket text frame carries exactly one named event encoded as
//! `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Color given to a new client when random colors are disabled
pub const DEFAULT_COLOR: &str = "#00aaff";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode event: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unknown coordinate system '{0}' (expected 'cartesian' or 'polar')")]
    UnknownCoordinates(String),
}

/// Opaque connection identifier assigned by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last reported position of a client, in client-defined units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Cartesian { x: f64, y: f64 },
    Polar { r: f64, theta: f64 },
}

impl Position {
    pub fn mode(&self) -> PositionMode {
        match self {
            Position::Cartesian { .. } => PositionMode::Cartesian,
            Position::Polar { .. } => PositionMode::Polar,
        }
    }
}

/// Coordinate system a deployment accepts for `move` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionMode {
    Cartesian,
    #[default]
    Polar,
}

impl PositionMode {
    /// Zero position in this coordinate system
    pub fn origin(self) -> Position {
        match self {
            PositionMode::Cartesian => Position::Cartesian { x: 0.0, y: 0.0 },
            PositionMode::Polar => Position::Polar { r: 0.0, theta: 0.0 },
        }
    }
}

impl FromStr for PositionMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cartesian" | "xy" => Ok(PositionMode::Cartesian),
            "polar" => Ok(PositionMode::Polar),
            other => Err(ProtocolError::UnknownCoordinates(other.to_string())),
        }
    }
}

impl fmt::Display for PositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionMode::Cartesian => f.write_str("cartesian"),
            PositionMode::Polar => f.write_str("polar"),
        }
    }
}

/// State of one connected client as it appears in `updateAll`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(flatten)]
    pub position: Position,
    pub color: String,
    /// Milliseconds since the Unix epoch
    pub last_active: u64,
}

impl ClientState {
    pub fn new(position: Position, color: impl Into<String>, last_active: u64) -> Self {
        Self {
            position,
            color: color.into(),
            last_active,
        }
    }
}

pub type Snapshot = HashMap<ClientId, ClientState>;

/// Payload of `updateAll`: the id -> state map itself
///
/// With `count` set, a `count` key sits next to the ids. Server ids are
/// 20 alphanumeric characters, so it never shadows a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAll {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(flatten)]
    pub clients: Snapshot,
}

/// Events pushed from the server to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Init(ClientId),
    UpdateAll(UpdateAll),
    Rejected(String),
}

/// Events sent from a client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Move(Position),
    Color(String),
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
