//! Unified error type for the polyarena server.

use polyarena_protocol::ProtocolError;
use polyarena_room::RoomError;
use polyarena_session::SessionError;
use polyarena_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// These only ever end a connection or stop the server. Problems with
/// what a client sent are absorbed inside the room as
/// [`Rejection`](polyarena_room::Rejection)s and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PolyarenaError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// The client did not send `join` within the configured timeout.
    #[error("no join received within {0:?}")]
    JoinTimeout(std::time::Duration),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use polyarena_protocol::{PlayerId, RoomId};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::Receive("reset by peer".into());
        let err: PolyarenaError = err.into();
        assert!(matches!(err, PolyarenaError::Transport(_)));
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: PolyarenaError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, PolyarenaError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: PolyarenaError = SessionError::AlreadyRemoved(PlayerId::from("p1")).into();
        assert!(matches!(err, PolyarenaError::Session(_)));
        assert!(err.to_string().contains("p1"));
    }

    #[test]
    fn test_from_room_error() {
        let err: PolyarenaError = RoomError::NotFound(RoomId(1)).into();
        assert!(matches!(err, PolyarenaError::Room(_)));
    }

    #[test]
    fn test_join_timeout_display() {
        let err = PolyarenaError::JoinTimeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "no join received within 5s");
    }
}
