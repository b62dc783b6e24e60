//! Identity and value types shared by every polyarena layer.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use polyarena_transport::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Longest player id a client may request when reconnecting.
pub const MAX_PLAYER_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The durable identity of a player.
///
/// Unlike a [`ConnectionId`], a `PlayerId` survives reconnects: the client
/// stores it and presents it in its `join` message to reclaim its shapes.
/// `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Validates an identity supplied by a client.
    ///
    /// Accepts 1–64 characters of `[A-Za-z0-9_-]`, which covers every id
    /// the server mints and keeps log lines and JSON free of surprises.
    pub fn parse_requested(raw: &str) -> Result<Self, ProtocolError> {
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if raw.is_empty() || raw.len() > MAX_PLAYER_ID_LEN || !valid_chars {
            return Err(ProtocolError::InvalidMessage(format!(
                "invalid player id {raw:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Globally unique shape identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(pub String);

impl ShapeId {
    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A unique identifier for a room (one isolated arena session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A 2D vector, used for velocities and displacements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A cosmetic shape color in `#RRGGBB` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Parses a color, accepting exactly `#` followed by six hex digits.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let valid = raw.len() == 7
            && raw.starts_with('#')
            && raw[1..].chars().all(|c| c.is_ascii_hexdigit());
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ProtocolError::InvalidMessage(format!(
                "invalid color {raw:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self("#ffffff".to_string())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive a server message?
// ---------------------------------------------------------------------------

/// Addressing for outbound messages inside a room.
///
/// Keyed by connection rather than player: a player in their grace period
/// has no connection and so receives nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected participant.
    All,

    /// One specific connection.
    Connection(ConnectionId),

    /// Everyone except the given connection (usually the sender).
    AllExcept(ConnectionId),
}

impl Recipient {
    /// Returns `true` if a message addressed this way reaches `conn`.
    pub fn includes(&self, conn: ConnectionId) -> bool {
        match self {
            Self::All => true,
            Self::Connection(target) => *target == conn,
            Self::AllExcept(excluded) => *excluded != conn,
        }
    }
}

/// Milliseconds since the Unix epoch, used for server timestamps.
pub fn server_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =========================================================================
// Tests
// =========================================================================
