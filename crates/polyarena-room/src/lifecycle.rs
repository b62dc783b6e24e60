//! Player lifecycle and periodic maintenance for one room.
//!
//! ```text
//!   join ──→ Active ──(disconnect)──→ GracePeriod ──(deadline / sweep)──→ Removed
//!              ↑                           │
//!              └────────(reconnect)────────┘
//! ```
//!
//! Each disconnect schedules one keyed deadline. Reconnecting cancels it
//! in the same call that reactivates the player, and removal cancels it
//! too, so a player is removed at most once however the two race.
//!
//! Maintenance work runs on its own timers, independent of traffic:
//! stray shapes are respawned every `boundary_check_interval` and
//! long-disconnected players are swept every `inactivity_sweep_interval`.

use polyarena_protocol::{PlayerId, RoomId, ServerMessage, Vec2};
use polyarena_tick::{DeadlineQueue, Periodic};
use polyarena_transport::ConnectionId;
use tokio::time::Instant;

use crate::broadcast::Outbox;
use crate::room::World;
use crate::{LifecycleConfig, RoomError};

/// Maintenance work that has come due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    BoundaryCheck,
    InactivitySweep,
    GraceExpiry,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    /// `true` if an existing player was resumed.
    pub reconnected: bool,
}

#[derive(Debug)]
pub struct LifecycleManager {
    room_id: RoomId,
    config: LifecycleConfig,
    max_players: usize,
    grace: DeadlineQueue<PlayerId>,
    boundary: Periodic,
    sweep: Periodic,
    /// Players removed since the last [`take_removed`](Self::take_removed).
    removed: Vec<PlayerId>,
}

impl LifecycleManager {
    pub fn new(
        room_id: RoomId,
        config: LifecycleConfig,
        max_players: usize,
        now: Instant,
    ) -> Self {
        let boundary = Periodic::new("boundary_check", config.boundary_check_interval, now);
        let sweep = Periodic::new("inactivity_sweep", config.inactivity_sweep_interval, now);
        Self {
            room_id,
            config,
            max_players,
            grace: DeadlineQueue::new(),
            boundary,
            sweep,
            removed: Vec::new(),
        }
    }

    /// Waits for the next piece of maintenance work. Cancel-safe.
    pub async fn next_due(&mut self) -> Maintenance {
        tokio::select! {
            _ = self.boundary.tick() => Maintenance::BoundaryCheck,
            _ = self.sweep.tick() => Maintenance::InactivitySweep,
            _ = self.grace.wait_next() => Maintenance::GraceExpiry,
        }
    }

    pub fn run(&mut self, world: &mut World, work: Maintenance, now: Instant) {
        match work {
            Maintenance::BoundaryCheck => {
                self.correct_boundaries(world, now);
            }
            Maintenance::InactivitySweep => {
                self.sweep_inactive(world, now);
            }
            Maintenance::GraceExpiry => {
                self.expire_due(world, now);
            }
        }
    }

    // -- joins --------------------------------------------------------------

    /// Binds `conn` to `player_id`, resuming the player if the room knows
    /// them and creating them otherwise. The joining connection receives a
    /// `joined` message with a full snapshot.
    ///
    /// Only a player in its grace period can be resumed. An identity that
    /// is still active on another connection is refused with
    /// [`RoomError::IdentityInUse`] and the live connection keeps it.
    pub fn join(
        &mut self,
        world: &mut World,
        conn: ConnectionId,
        player_id: PlayerId,
        outbox: Outbox,
        now: Instant,
    ) -> Result<JoinOutcome, RoomError> {
        let reconnected = match world.store.player_mut(&player_id) {
            Some(player) => {
                if player.state.is_active() {
                    tracing::warn!(room_id = %self.room_id, %conn, %player_id, "join refused, identity already connected");
                    return Err(RoomError::IdentityInUse(player_id));
                }
                player.state.resume(&player_id)?;
                player.last_activity = now;
                self.grace.cancel(&player_id);
                tracing::info!(room_id = %self.room_id, %player_id, "player reconnected within grace period");
                self.repair_shapes(world, &player_id, now);
                true
            }
            None => {
                if world.store.player_count() >= self.max_players {
                    return Err(RoomError::RoomFull(self.room_id));
                }
                world.store.create_player(player_id.clone(), now);
                match world.store.create_shape(&player_id, None, now) {
                    Ok(shape) => world.replication.mark_changed(shape.id.clone()),
                    Err(rejection) => rejection.log(self.room_id, conn),
                }
                tracing::info!(room_id = %self.room_id, %player_id, players = world.store.player_count(), "player joined");
                false
            }
        };

        if let Some(old) = world.registry.bind(conn, player_id.clone()) {
            world.broadcaster.detach(old);
        }
        world.broadcaster.attach(conn, outbox);
        world.broadcaster.send_to(
            conn,
            ServerMessage::Joined {
                player_id: player_id.clone(),
                reconnected,
                shapes: world.store.snapshot(),
            },
        );

        Ok(JoinOutcome {
            room_id: self.room_id,
            player_id,
            reconnected,
        })
    }

    /// A resumed player gets exactly one shape if they had none, and loses
    /// any beyond the per-player cap.
    fn repair_shapes(&self, world: &mut World, player_id: &PlayerId, now: Instant) {
        let limit = world.store.arena().max_shapes_per_player;
        let owned = world
            .store
            .player(player_id)
            .map_or(0, |player| player.shapes().len());

        if owned == 0 {
            if let Ok(shape) = world.store.create_shape(player_id, None, now) {
                tracing::debug!(%player_id, shape_id = %shape.id, "replacement shape created on reconnect");
                world.replication.mark_changed(shape.id.clone());
            }
        } else if owned > limit {
            for shape in world.store.truncate_shapes(player_id, limit) {
                tracing::debug!(%player_id, shape_id = %shape.id, "excess shape removed on reconnect");
                world.replication.mark_removed(shape.id);
            }
        }
    }

    // -- departures ---------------------------------------------------------

    /// Handles a closed connection. The player, if the connection still
    /// spoke for one, enters their grace period.
    pub fn disconnect(
        &mut self,
        world: &mut World,
        conn: ConnectionId,
        now: Instant,
    ) -> Option<PlayerId> {
        world.broadcaster.detach(conn);
        let Some(player_id) = world.registry.unbind(conn) else {
            tracing::trace!(room_id = %self.room_id, %conn, "stale connection left");
            return None;
        };
        let player = world.store.player_mut(&player_id)?;
        if let Err(err) = player.state.enter_grace(&player_id, now) {
            tracing::debug!(room_id = %self.room_id, error = %err, "disconnect ignored");
            return None;
        }

        let grace = self.config.session.reconnect_grace;
        self.grace.schedule(player_id.clone(), now + grace);
        tracing::info!(
            room_id = %self.room_id,
            %player_id,
            grace_secs = grace.as_secs(),
            "player disconnected, grace period started"
        );
        Some(player_id)
    }

    /// Removes every player whose grace deadline has passed.
    pub fn expire_due(&mut self, world: &mut World, now: Instant) -> Vec<PlayerId> {
        self.grace
            .pop_due(now)
            .into_iter()
            .filter(|player_id| self.remove_player(world, player_id, "grace period expired"))
            .collect()
    }

    /// Removes players who have been disconnected longer than
    /// `max_inactive`, whether or not their deadline fired.
    pub fn sweep_inactive(&mut self, world: &mut World, now: Instant) -> Vec<PlayerId> {
        let max_inactive = self.config.session.max_inactive;
        let stale: Vec<PlayerId> = world
            .store
            .players()
            .filter(|p| p.state.disconnected_for(now).is_some_and(|d| d >= max_inactive))
            .map(|p| p.id.clone())
            .collect();
        stale
            .into_iter()
            .filter(|player_id| self.remove_player(world, player_id, "inactive too long"))
            .collect()
    }

    /// Permanently removes a player and their shapes, telling everyone
    /// still connected. Returns `false` if there was nobody to remove.
    pub fn remove_player(&mut self, world: &mut World, player_id: &PlayerId, reason: &str) -> bool {
        self.grace.cancel(player_id);
        let Some(player) = world.store.player_mut(player_id) else {
            return false;
        };
        if player.state.remove(player_id).is_err() {
            return false;
        }

        if let Some(conn) = world.registry.unbind_player(player_id) {
            world.broadcaster.detach(conn);
        }
        if let Some((_, shapes)) = world.store.remove_player(player_id) {
            for shape in shapes {
                world.replication.mark_removed(shape.id);
            }
        }
        world.broadcaster.player_removed(player_id);
        self.removed.push(player_id.clone());
        tracing::info!(room_id = %self.room_id, %player_id, reason, "player removed");
        true
    }

    // -- maintenance --------------------------------------------------------

    /// Respawns shapes that strayed beyond the boundary margin, zeroing
    /// their velocity and announcing the correction to everyone.
    pub fn correct_boundaries(&mut self, world: &mut World, now: Instant) -> usize {
        let arena = world.store.arena().clone();
        let stray: Vec<_> = world
            .store
            .shapes()
            .filter(|s| arena.beyond_boundary(s.position.x, s.position.y))
            .map(|s| s.id.clone())
            .collect();

        let mut rng = rand::rng();
        for shape_id in &stray {
            let Some(shape) = world.store.shape_mut(shape_id) else {
                continue;
            };
            tracing::info!(
                room_id = %self.room_id,
                %shape_id,
                x = shape.position.x,
                y = shape.position.y,
                "shape out of bounds, respawning"
            );
            shape.position = arena.spawn_point(&mut rng);
            shape.velocity = Vec2::ZERO;
            shape.last_update = now;
            world.broadcaster.correct(shape);
            world.replication.mark_changed(shape_id.clone());
        }
        stray.len()
    }

    // -- accessors ----------------------------------------------------------

    /// Players removed since the last call.
    pub fn take_removed(&mut self) -> Vec<PlayerId> {
        std::mem::take(&mut self.removed)
    }

    /// When a disconnected player will be removed.
    pub fn grace_deadline(&self, player_id: &PlayerId) -> Option<Instant> {
        self.grace.deadline(player_id)
    }

    pub fn pending_expiries(&self) -> usize {
        self.grace.len()
    }
}
