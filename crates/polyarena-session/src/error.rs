//! Error types for the session layer.

use polyarena_protocol::PlayerId;

/// Errors from the player connection state machine.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested transition isn't allowed from the current state,
    /// e.g. disconnecting a player who is already in their grace period.
    #[error("player {player_id} cannot move from {from} to {to}")]
    InvalidTransition {
        player_id: PlayerId,
        from: &'static str,
        to: &'static str,
    },

    /// The player was already permanently removed.
    #[error("player {0} was already removed")]
    AlreadyRemoved(PlayerId),
}
