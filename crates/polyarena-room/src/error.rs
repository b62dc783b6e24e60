//! Error types for the room layer.
//!
//! [`RoomError`] is for callers of the room API (joining, routing,
//! talking to a room actor). [`Rejection`] is for client input the room
//! refused: it is logged and dropped, never sent back to the client.

use std::fmt;

use polyarena_protocol::{PlayerId, ProtocolError, RoomId, ShapeId};
use polyarena_session::SessionError;
use polyarena_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room has no free player slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The identity is held by another live connection.
    #[error("player {0} is already connected")]
    IdentityInUse(PlayerId),

    /// A player lifecycle transition was refused.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Why a client request was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Undecodable or semantically invalid input.
    MalformedMessage(String),
    /// The connection is not bound to any player.
    UnknownSession,
    /// The shape doesn't exist or belongs to someone else.
    OwnershipViolation(ShapeId),
    /// A proposed position outside the hard bounds.
    OutOfBoundsInput { shape_id: ShapeId, x: f64, y: f64 },
    /// The player already owns the maximum number of shapes.
    CapacityExceeded { limit: usize },
    /// An explicit shape id that is already in use.
    DuplicateShape(ShapeId),
    /// Removing the player's only shape while that isn't allowed.
    LastShape(ShapeId),
}

impl Rejection {
    /// Logs the rejection at the level its kind calls for.
    pub fn log(&self, room_id: RoomId, conn: ConnectionId) {
        match self {
            Self::UnknownSession => {
                tracing::trace!(%room_id, %conn, "{self}");
            }
            Self::OwnershipViolation(_) | Self::OutOfBoundsInput { .. } => {
                tracing::warn!(%room_id, %conn, "{self}");
            }
            Self::DuplicateShape(_) => {
                tracing::debug!(%room_id, %conn, "{self}");
            }
            Self::MalformedMessage(_)
            | Self::CapacityExceeded { .. }
            | Self::LastShape(_) => {
                tracing::info!(%room_id, %conn, "{self}");
            }
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage(reason) => {
                write!(f, "malformed message dropped: {reason}")
            }
            Self::UnknownSession => {
                f.write_str("message from unknown session dropped")
            }
            Self::OwnershipViolation(shape_id) => {
                write!(f, "update for shape {shape_id} not owned by sender dropped")
            }
            Self::OutOfBoundsInput { shape_id, x, y } => {
                write!(f, "out-of-bounds position ({x}, {y}) for shape {shape_id} dropped")
            }
            Self::CapacityExceeded { limit } => {
                write!(f, "shape limit of {limit} reached, create dropped")
            }
            Self::DuplicateShape(shape_id) => {
                write!(f, "shape id {shape_id} already in use")
            }
            Self::LastShape(shape_id) => {
                write!(f, "refusing to remove last shape {shape_id}")
            }
        }
    }
}

impl From<ProtocolError> for Rejection {
    fn from(err: ProtocolError) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}
