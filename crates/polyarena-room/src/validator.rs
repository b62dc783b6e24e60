//! Anti-cheat reconciliation of client-reported movement.
//!
//! Clients simulate their own shapes and report the results. The server
//! never trusts those reports outright:
//!
//! 1. Only the owner may move a shape.
//! 2. Positions far outside the arena are rejected entirely. A missing
//!    coordinate means "stay where you are" on that axis.
//! 3. Each velocity component is clamped to `±max_velocity`.
//! 4. Displacement since the last accepted update is capped at
//!    `position_rate_limit × dt`. A longer jump is scaled back along the
//!    same direction, so a lagging client still moves the right way.
//!
//! [`UpdateValidator::reconcile`] does the math without touching the
//! store; `apply_*` check ownership, reconcile and write the result.

use polyarena_protocol::{PlayerId, ShapeId, ShapeMove, Vec2};
use tokio::time::Instant;

use crate::{ArenaConfig, EntityStore, Rejection, Shape};

/// The authoritative outcome of a proposed move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    pub position: Vec2,
    pub angle: f64,
    pub velocity: Vec2,
    /// `true` if the displacement was scaled back.
    pub clamped: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateValidator {
    arena: ArenaConfig,
}

impl UpdateValidator {
    pub fn new(arena: ArenaConfig) -> Self {
        Self { arena }
    }

    /// Computes where `shape` may end up given `proposal` at `now`.
    pub fn reconcile(
        &self,
        shape: &Shape,
        proposal: &ShapeMove,
        now: Instant,
    ) -> Result<Reconciled, Rejection> {
        let target = proposal.target(shape.position);
        if !self.arena.within_hard_bounds(target.x, target.y) {
            return Err(Rejection::OutOfBoundsInput {
                shape_id: shape.id.clone(),
                x: target.x,
                y: target.y,
            });
        }

        let velocity = self
            .arena
            .clamp_velocity(proposal.velocity.unwrap_or(shape.velocity));

        let dt = now.saturating_duration_since(shape.last_update).as_secs_f64();
        let max_delta = self.arena.position_rate_limit * dt;
        let delta = Vec2::new(
            target.x - shape.position.x,
            target.y - shape.position.y,
        );
        let distance = delta.length();

        let (position, clamped) = if distance > max_delta {
            let scale = max_delta / distance;
            let position = Vec2::new(
                shape.position.x + delta.x * scale,
                shape.position.y + delta.y * scale,
            );
            (position, true)
        } else {
            (target, false)
        };

        Ok(Reconciled {
            position,
            angle: proposal.angle.unwrap_or(shape.angle),
            velocity,
            clamped,
        })
    }

    /// Validates a move from `player` and applies it to the store.
    pub fn apply_move<'s>(
        &self,
        store: &'s mut EntityStore,
        player: &PlayerId,
        proposal: &ShapeMove,
        now: Instant,
    ) -> Result<&'s Shape, Rejection> {
        let shape = store.owned_shape_mut(player, &proposal.shape_id)?;
        let outcome = self.reconcile(shape, proposal, now)?;
        if outcome.clamped {
            tracing::debug!(
                player_id = %player,
                shape_id = %shape.id,
                x = outcome.position.x,
                y = outcome.position.y,
                "displacement exceeded rate limit, scaled back"
            );
        }

        shape.position = outcome.position;
        shape.angle = outcome.angle;
        shape.velocity = outcome.velocity;
        shape.last_update = now;
        Ok(&*shape)
    }

    /// Adds `impulse` to a shape's velocity, then clamps it. Position and
    /// the displacement clock are left alone.
    pub fn apply_impulse<'s>(
        &self,
        store: &'s mut EntityStore,
        player: &PlayerId,
        shape_id: &ShapeId,
        impulse: Vec2,
    ) -> Result<&'s Shape, Rejection> {
        let shape = store.owned_shape_mut(player, shape_id)?;
        let combined = Vec2::new(
            shape.velocity.x + impulse.x,
            shape.velocity.y + impulse.y,
        );
        shape.velocity = self.arena.clamp_velocity(combined);
        Ok(&*shape)
    }
}
