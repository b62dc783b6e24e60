//! The room aggregate: one arena's complete state and the rules that
//! mutate it.
//!
//! A [`Room`] is plain synchronous data. Every method takes the current
//! time explicitly, so the whole rule set can be driven deterministically
//! from tests; the actor in [`crate::actor`] is what feeds it real
//! messages and real time.
//!
//! Inbound data flows one way:
//!
//! ```text
//! ClientMessage → Command → registry.resolve(conn) → validator → store → broadcaster
//! ```

use polyarena_protocol::{
    AuthoritativeAction, ClientMessage, Command, PlayerId, Recipient, RoomId,
    ServerMessage, server_time_millis,
};
use polyarena_session::SessionRegistry;
use polyarena_transport::ConnectionId;
use tokio::time::Instant;

use crate::broadcast::{Outbox, position_of};
use crate::{
    Broadcaster, EntityStore, JoinOutcome, LifecycleManager, Maintenance,
    Rejection, Replication, RoomConfig, RoomError, UpdateValidator,
};

/// The mutable state of a room that both message handling and
/// maintenance work on.
#[derive(Debug)]
pub struct World {
    pub store: EntityStore,
    pub registry: SessionRegistry,
    pub broadcaster: Broadcaster,
    pub replication: Replication,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    /// Players in the room, including those in their grace period.
    pub player_count: usize,
    /// Players with a live connection.
    pub connected: usize,
    pub shape_count: usize,
    pub max_players: usize,
}

impl RoomInfo {
    pub fn has_capacity(&self) -> bool {
        self.player_count < self.max_players
    }
}

#[derive(Debug)]
pub struct Room {
    room_id: RoomId,
    max_players: usize,
    world: World,
    validator: UpdateValidator,
    lifecycle: LifecycleManager,
}

impl Room {
    pub fn new(room_id: RoomId, config: RoomConfig, now: Instant) -> Self {
        let config = config.validated();
        let world = World {
            store: EntityStore::new(config.arena.clone()),
            registry: SessionRegistry::new(),
            broadcaster: Broadcaster::new(room_id),
            replication: Replication::new(),
        };
        Self {
            room_id,
            max_players: config.max_players,
            validator: UpdateValidator::new(config.arena),
            lifecycle: LifecycleManager::new(room_id, config.lifecycle, config.max_players, now),
            world,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn join(
        &mut self,
        conn: ConnectionId,
        player_id: PlayerId,
        outbox: Outbox,
        now: Instant,
    ) -> Result<JoinOutcome, RoomError> {
        self.lifecycle.join(&mut self.world, conn, player_id, outbox, now)
    }

    /// The connection closed. Its player, if any, enters the grace period.
    pub fn leave(&mut self, conn: ConnectionId, now: Instant) -> Option<PlayerId> {
        self.lifecycle.disconnect(&mut self.world, conn, now)
    }

    /// Validates a decoded client message and acts on it.
    pub fn handle_message(&mut self, conn: ConnectionId, msg: ClientMessage, now: Instant) {
        match Command::try_from(msg) {
            Ok(cmd) => self.handle_command(conn, cmd, now),
            Err(err) => Rejection::from(err).log(self.room_id, conn),
        }
    }

    pub fn handle_command(&mut self, conn: ConnectionId, cmd: Command, now: Instant) {
        let Some(player_id) = self.world.registry.resolve(conn).cloned() else {
            Rejection::UnknownSession.log(self.room_id, conn);
            return;
        };
        self.world.store.touch(&player_id, now);

        if let Err(rejection) = self.apply(conn, &player_id, cmd, now) {
            rejection.log(self.room_id, conn);
        }
    }

    fn apply(
        &mut self,
        conn: ConnectionId,
        player_id: &PlayerId,
        cmd: Command,
        now: Instant,
    ) -> Result<(), Rejection> {
        let world = &mut self.world;
        match cmd {
            // Batched reports are not relayed; replication carries them.
            Command::UpdateShapes(moves) => {
                for proposal in &moves {
                    match self.validator.apply_move(&mut world.store, player_id, proposal, now) {
                        Ok(shape) => world.replication.mark_changed(shape.id.clone()),
                        Err(rejection) => rejection.log(self.room_id, conn),
                    }
                }
            }
            Command::Move(proposal) => {
                let shape = self.validator.apply_move(&mut world.store, player_id, &proposal, now)?;
                world.broadcaster.propagate(conn, player_id, &shape.id, position_of(shape));
                world.replication.mark_changed(shape.id.clone());
            }
            Command::Impulse { shape_id, impulse } => {
                let shape = self.validator.apply_impulse(&mut world.store, player_id, &shape_id, impulse)?;
                let action = AuthoritativeAction::Impulse {
                    shape_id: shape.id.clone(),
                    velocity: shape.velocity,
                };
                world.broadcaster.propagate(conn, player_id, &shape.id, action);
                world.replication.mark_changed(shape_id);
            }
            Command::CreateShape => {
                let shape = world.store.create_shape(player_id, None, now)?;
                tracing::info!(room_id = %self.room_id, %player_id, shape_id = %shape.id, "shape created");
                world.replication.mark_changed(shape.id.clone());
            }
            Command::RemoveShape(shape_id) => {
                let shape = world.store.remove_shape(player_id, &shape_id)?;
                tracing::info!(room_id = %self.room_id, %player_id, %shape_id, "shape removed");
                world.replication.mark_removed(shape.id);
            }
            Command::ChangeColor(color) => {
                for shape_id in world.store.set_shape_color(player_id, color.clone()) {
                    world.replication.mark_changed(shape_id);
                }
                world.broadcaster.color_changed(conn, player_id, color);
            }
            Command::Ping => {
                world.broadcaster.dispatch(
                    Recipient::Connection(conn),
                    ServerMessage::Pong {
                        timestamp: server_time_millis(),
                    },
                );
            }
        }
        Ok(())
    }

    /// One simulation tick: flush changed shapes to every participant.
    pub fn tick(&mut self) {
        if let Some(msg) = self.world.replication.flush(&self.world.store) {
            self.world.broadcaster.dispatch(Recipient::All, msg);
        }
    }

    /// Waits for the next maintenance work. Cancel-safe.
    pub async fn next_maintenance(&mut self) -> Maintenance {
        self.lifecycle.next_due().await
    }

    pub fn maintain(&mut self, work: Maintenance, now: Instant) {
        self.lifecycle.run(&mut self.world, work, now);
    }

    /// Players removed since the last call.
    pub fn take_removed(&mut self) -> Vec<PlayerId> {
        self.lifecycle.take_removed()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            player_count: self.world.store.player_count(),
            connected: self.world.registry.len(),
            shape_count: self.world.store.shape_count(),
            max_players: self.max_players,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.world.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.world.registry
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Split borrow for driving lifecycle operations directly.
    pub fn parts_mut(&mut self) -> (&mut LifecycleManager, &mut World) {
        (&mut self.lifecycle, &mut self.world)
    }
}
