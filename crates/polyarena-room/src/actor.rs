//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! All access to a room goes through its command channel, so the room's
//! state is only ever touched by one task. The actor interleaves
//! commands, the simulation tick and maintenance timers in a single
//! `select!`; none of them ever run concurrently.

use polyarena_protocol::{ClientMessage, PlayerId, RoomId};
use polyarena_tick::{TickConfig, TickScheduler};
use polyarena_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::broadcast::Outbox;
use crate::{JoinOutcome, Room, RoomConfig, RoomError, RoomInfo};

/// Notifications a room sends its manager: this player is gone for good.
pub(crate) type RemovalSender = mpsc::UnboundedSender<(RoomId, PlayerId)>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        conn: ConnectionId,
        player_id: PlayerId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },
    /// The connection closed.
    Leave { conn: ConnectionId },
    Message {
        conn: ConnectionId,
        msg: ClientMessage,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it wraps the command channel's sender.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Join { conn, player_id, .. } => {
                write!(f, "Join({conn}, {player_id})")
            }
            Self::Leave { conn } => write!(f, "Leave({conn})"),
            Self::Message { conn, .. } => write!(f, "Message({conn})"),
            Self::GetInfo { .. } => f.write_str("GetInfo"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Asks the room to admit `player_id` on `conn`.
    pub async fn join(
        &self,
        conn: ConnectionId,
        player_id: PlayerId,
        outbox: Outbox,
    ) -> Result<JoinOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            conn,
            player_id,
            outbox,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Tells the room a connection closed.
    pub async fn leave(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(RoomCommand::Leave { conn }).await
    }

    /// Delivers a client message (fire-and-forget).
    pub async fn send_message(
        &self,
        conn: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        self.send(RoomCommand::Message { conn, msg }).await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

struct RoomActor {
    room: Room,
    scheduler: TickScheduler,
    receiver: mpsc::Receiver<RoomCommand>,
    removals: RemovalSender,
}

impl RoomActor {
    async fn run(mut self) {
        let room_id = self.room.room_id();
        tracing::info!(%room_id, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                _ = self.scheduler.wait_for_tick() => {
                    self.room.tick();
                    self.scheduler.record_tick_end();
                }
                work = self.room.next_maintenance() => {
                    self.room.maintain(work, Instant::now());
                }
            }
            self.report_removals();
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        let now = Instant::now();
        match cmd {
            RoomCommand::Join {
                conn,
                player_id,
                outbox,
                reply,
            } => {
                let result = self.room.join(conn, player_id, outbox, now);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { conn } => {
                self.room.leave(conn, now);
            }
            RoomCommand::Message { conn, msg } => {
                self.room.handle_message(conn, msg, now);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.room.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room.room_id(), "room shutting down");
                return false;
            }
        }
        true
    }

    fn report_removals(&mut self) {
        let room_id = self.room.room_id();
        for player_id in self.room.take_removed() {
            let _ = self.removals.send((room_id, player_id));
        }
    }
}

/// Spawns a room actor task and returns a handle to it.
pub(crate) fn spawn_room(
    room_id: RoomId,
    config: RoomConfig,
    removals: RemovalSender,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let scheduler = TickScheduler::new(TickConfig::with_rate(config.tick_rate_hz));

    let actor = RoomActor {
        room: Room::new(room_id, config, Instant::now()),
        scheduler,
        receiver: rx,
        removals,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
