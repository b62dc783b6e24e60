//! Session types: a player's connection state and the timing rules for it.
//!
//! A player's *identity* outlives any single connection. When the socket
//! drops, the player enters a grace period during which their shapes stay
//! in the arena; if they come back with the same identity they pick up
//! where they left off, otherwise they are removed for good.

use std::time::Duration;

use polyarena_protocol::PlayerId;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing rules for disconnected players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a disconnected player keeps their identity and shapes.
    ///
    /// Default: 60 seconds. [`validated`](Self::validated) keeps it within
    /// [`MIN_GRACE`](Self::MIN_GRACE)..=[`MAX_GRACE`](Self::MAX_GRACE).
    pub reconnect_grace: Duration,

    /// Hard ceiling on time spent in the grace period. The inactivity sweep
    /// removes anyone past it even if their expiry deadline was lost.
    ///
    /// Default: 300 seconds.
    pub max_inactive: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(60),
            max_inactive: Duration::from_secs(300),
        }
    }
}

impl SessionConfig {
    pub const MIN_GRACE: Duration = Duration::from_secs(60);
    pub const MAX_GRACE: Duration = Duration::from_secs(300);

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// - `reconnect_grace` is clamped to `MIN_GRACE..=MAX_GRACE`.
    /// - `max_inactive` is raised to at least `reconnect_grace`, so the
    ///   sweep never beats a healthy expiry deadline.
    pub fn validated(mut self) -> Self {
        let clamped = self
            .reconnect_grace
            .clamp(Self::MIN_GRACE, Self::MAX_GRACE);
        if clamped != self.reconnect_grace {
            tracing::warn!(
                requested_secs = self.reconnect_grace.as_secs_f64(),
                clamped_secs = clamped.as_secs_f64(),
                "reconnect_grace out of range, clamping"
            );
            self.reconnect_grace = clamped;
        }
        if self.max_inactive < self.reconnect_grace {
            tracing::warn!(
                max_inactive_secs = self.max_inactive.as_secs_f64(),
                "max_inactive shorter than reconnect_grace, raising it"
            );
            self.max_inactive = self.reconnect_grace;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where a player is in the connection lifecycle.
///
/// ```text
///   Active ──(disconnect)──→ GracePeriod ──(expiry / sweep)──→ Removed
///     ↑                           │
///     └────────(reconnect)────────┘
/// ```
///
/// `Removed` is terminal. Transitions go through the methods below, which
/// refuse anything the diagram doesn't allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Player has a live connection.
    Active,

    /// Player lost their connection at `since` and may still come back.
    GracePeriod { since: Instant },

    /// Player is gone for good.
    Removed,
}

impl ConnectionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }

    /// How long the player has been in the grace period, if they are in it.
    pub fn disconnected_for(&self, now: Instant) -> Option<Duration> {
        match self {
            Self::GracePeriod { since } => {
                Some(now.saturating_duration_since(*since))
            }
            _ => None,
        }
    }

    /// `Active → GracePeriod`.
    pub fn enter_grace(
        &mut self,
        player_id: &PlayerId,
        now: Instant,
    ) -> Result<(), SessionError> {
        match self {
            Self::Active => {
                *self = Self::GracePeriod { since: now };
                Ok(())
            }
            _ => Err(self.invalid(player_id, "grace period")),
        }
    }

    /// `GracePeriod → Active`. A player that is still active cannot be
    /// resumed: its identity is held by a live connection.
    pub fn resume(&mut self, player_id: &PlayerId) -> Result<(), SessionError> {
        match self {
            Self::GracePeriod { .. } => {
                *self = Self::Active;
                Ok(())
            }
            _ => Err(self.invalid(player_id, "active")),
        }
    }

    /// `* → Removed`. Fails only if the player was already removed, which
    /// is how callers guarantee removal happens exactly once.
    pub fn remove(&mut self, player_id: &PlayerId) -> Result<(), SessionError> {
        match self {
            Self::Removed => Err(SessionError::AlreadyRemoved(player_id.clone())),
            _ => {
                *self = Self::Removed;
                Ok(())
            }
        }
    }

    fn invalid(&self, player_id: &PlayerId, to: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            player_id: player_id.clone(),
            from: self.label(),
            to,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::GracePeriod { .. } => "grace period",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
