//! Room and arena configuration.

use std::time::Duration;

use polyarena_protocol::Vec2;
use polyarena_session::SessionConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ArenaConfig
// ---------------------------------------------------------------------------

/// Geometry and movement limits of the play area.
///
/// The arena spans `0..width` horizontally and `0..height` vertically,
/// with y growing downwards (the spawn band sits near the floor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f64,
    pub height: f64,

    /// Proposed positions further than this outside the arena are
    /// rejected outright instead of being clamped.
    pub hard_bounds_margin: f64,

    /// Shapes further than this outside the arena are respawned by the
    /// periodic boundary check.
    pub boundary_margin: f64,

    /// Per-axis velocity limit, in units per second.
    pub max_velocity: f64,

    /// Maximum distance a shape may travel per second of wall time.
    pub position_rate_limit: f64,

    /// Spawn band: x is drawn from
    /// `spawn_margin_left..=width - spawn_margin_right`.
    pub spawn_margin_left: f64,
    pub spawn_margin_right: f64,

    /// Spawn band: y is `height - spawn_floor_offset`.
    pub spawn_floor_offset: f64,

    pub max_shapes_per_player: usize,

    /// Whether a player may remove their only shape.
    pub allow_remove_last_shape: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 2400.0,
            height: 1800.0,
            hard_bounds_margin: 200.0,
            boundary_margin: 100.0,
            max_velocity: 50.0,
            position_rate_limit: 100.0,
            spawn_margin_left: 100.0,
            spawn_margin_right: 200.0,
            spawn_floor_offset: 50.0,
            max_shapes_per_player: 4,
            allow_remove_last_shape: false,
        }
    }
}

impl ArenaConfig {
    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if !(self.width.is_finite() && self.width > 0.0) {
            tracing::warn!(width = self.width, "invalid arena width, using default");
            self.width = defaults.width;
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            tracing::warn!(height = self.height, "invalid arena height, using default");
            self.height = defaults.height;
        }
        for (name, value) in [
            ("hard_bounds_margin", &mut self.hard_bounds_margin),
            ("boundary_margin", &mut self.boundary_margin),
            ("max_velocity", &mut self.max_velocity),
            ("position_rate_limit", &mut self.position_rate_limit),
            ("spawn_margin_left", &mut self.spawn_margin_left),
            ("spawn_margin_right", &mut self.spawn_margin_right),
            ("spawn_floor_offset", &mut self.spawn_floor_offset),
        ] {
            if !(value.is_finite() && *value >= 0.0) {
                tracing::warn!(field = name, value = *value, "negative or non-finite, using 0");
                *value = 0.0;
            }
        }
        if self.max_shapes_per_player == 0 {
            tracing::warn!("max_shapes_per_player must be at least 1, raising it");
            self.max_shapes_per_player = 1;
        }
        self
    }

    /// `true` if `(x, y)` lies within the arena grown by `margin` on
    /// every side.
    pub fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        x >= -margin
            && x <= self.width + margin
            && y >= -margin
            && y <= self.height + margin
    }

    /// `true` if a proposed position is close enough to the arena to be
    /// considered at all.
    pub fn within_hard_bounds(&self, x: f64, y: f64) -> bool {
        self.contains(x, y, self.hard_bounds_margin)
    }

    /// `true` if a shape at `(x, y)` has strayed far enough to be
    /// respawned.
    pub fn beyond_boundary(&self, x: f64, y: f64) -> bool {
        !self.contains(x, y, self.boundary_margin)
    }

    /// Horizontal range of the spawn band. Collapses to a single point
    /// when the margins leave no room.
    pub fn spawn_x_range(&self) -> (f64, f64) {
        let low = self.spawn_margin_left;
        let high = (self.width - self.spawn_margin_right).max(low);
        (low, high)
    }

    /// A random point in the spawn band.
    pub fn spawn_point(&self, rng: &mut impl Rng) -> Vec2 {
        let (low, high) = self.spawn_x_range();
        let x = if high > low {
            rng.random_range(low..=high)
        } else {
            low
        };
        Vec2::new(x, self.height - self.spawn_floor_offset)
    }

    /// Clamps each velocity component to `±max_velocity`.
    pub fn clamp_velocity(&self, v: Vec2) -> Vec2 {
        let limit = self.max_velocity;
        Vec2::new(v.x.clamp(-limit, limit), v.y.clamp(-limit, limit))
    }
}

// ---------------------------------------------------------------------------
// LifecycleConfig
// ---------------------------------------------------------------------------

/// Cadence of a room's maintenance work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Grace period and inactivity ceiling for disconnected players.
    pub session: SessionConfig,

    /// How often stray shapes are respawned. Default: 1 second.
    pub boundary_check_interval: Duration,

    /// How often long-disconnected players are swept. Default: 30 seconds.
    pub inactivity_sweep_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            boundary_check_interval: Duration::from_secs(1),
            inactivity_sweep_interval: Duration::from_secs(30),
        }
    }
}

impl LifecycleConfig {
    pub fn validated(mut self) -> Self {
        self.session = self.session.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for a room instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Players a room holds, counting those in their grace period.
    pub max_players: usize,

    /// Replication tick rate in Hz.
    pub tick_rate_hz: u32,

    /// Capacity of the room's command channel.
    pub channel_size: usize,

    pub arena: ArenaConfig,
    pub lifecycle: LifecycleConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 16,
            tick_rate_hz: 60,
            channel_size: 256,
            arena: ArenaConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Clamps out-of-range values in this config and everything it holds.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 {
            tracing::warn!("max_players must be at least 1, raising it");
            self.max_players = 1;
        }
        self.channel_size = self.channel_size.max(1);
        self.arena = self.arena.validated();
        self.lifecycle = self.lifecycle.validated();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.tick_rate_hz, 60);
        assert_eq!(config.arena.width, 2400.0);
        assert_eq!(config.arena.height, 1800.0);
        assert_eq!(
            config.lifecycle.session.reconnect_grace,
            Duration::from_secs(60)
        );
        assert_eq!(
            config.lifecycle.inactivity_sweep_interval,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_spawn_point_stays_in_band() {
        let arena = ArenaConfig::default();
        let mut rng = rand::rng();
        for _ in 0..200 {
            let p = arena.spawn_point(&mut rng);
            assert!((100.0..=2200.0).contains(&p.x), "x = {}", p.x);
            assert_eq!(p.y, 1750.0);
        }
    }

    #[test]
    fn test_spawn_x_range_collapses_in_narrow_arena() {
        let arena = ArenaConfig {
            width: 250.0,
            ..ArenaConfig::default()
        };
        assert_eq!(arena.spawn_x_range(), (100.0, 100.0));
        assert_eq!(arena.spawn_point(&mut rand::rng()).x, 100.0);
    }

    #[test]
    fn test_hard_bounds_and_boundary_margins() {
        let arena = ArenaConfig::default();
        assert!(arena.within_hard_bounds(-200.0, 900.0));
        assert!(!arena.within_hard_bounds(-200.1, 900.0));
        assert!(!arena.beyond_boundary(-100.0, 900.0));
        assert!(arena.beyond_boundary(-150.0, 900.0));
        assert!(arena.beyond_boundary(1200.0, 1901.0));
    }

    #[test]
    fn test_clamp_velocity_per_axis() {
        let arena = ArenaConfig::default();
        let v = arena.clamp_velocity(Vec2::new(120.0, -75.0));
        assert_eq!(v, Vec2::new(50.0, -50.0));
    }

    #[test]
    fn test_validated_repairs_bad_values() {
        let config = RoomConfig {
            max_players: 0,
            arena: ArenaConfig {
                width: -5.0,
                max_velocity: f64::NAN,
                max_shapes_per_player: 0,
                ..ArenaConfig::default()
            },
            ..RoomConfig::default()
        }
        .validated();

        assert_eq!(config.max_players, 1);
        assert_eq!(config.arena.width, 2400.0);
        assert_eq!(config.arena.max_velocity, 0.0);
        assert_eq!(config.arena.max_shapes_per_player, 1);
    }

    #[test]
    fn test_room_config_partial_json_uses_defaults() {
        let config: RoomConfig =
            serde_json::from_str(r#"{"max_players": 4, "arena": {"width": 1000.0}}"#)
                .unwrap();
        assert_eq!(config.max_players, 4);
        assert_eq!(config.arena.width, 1000.0);
        assert_eq!(config.arena.height, 1800.0);
        assert_eq!(config.tick_rate_hz, 60);
    }
}
