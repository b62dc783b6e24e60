//! Room manager: creates rooms, routes joins, and remembers which room
//! holds each durable player identity.

use std::collections::HashMap;

use polyarena_protocol::{PlayerId, RoomId};
use polyarena_session::mint_player_id;
use polyarena_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::actor::{RemovalSender, spawn_room};
use crate::broadcast::Outbox;
use crate::{JoinOutcome, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Manages all active rooms.
///
/// A player identity lives in at most one room. Reconnects that present
/// a known identity are routed back to that room; everyone else goes to
/// the first room with a free slot.
pub struct RoomManager {
    config: RoomConfig,
    next_room_id: u64,

    /// Active rooms, keyed by room ID.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Which room each known player identity lives in.
    player_rooms: HashMap<PlayerId, RoomId>,

    removals_tx: RemovalSender,
    /// Rooms report permanently removed players here; drained lazily.
    removals_rx: mpsc::UnboundedReceiver<(RoomId, PlayerId)>,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        let (removals_tx, removals_rx) = mpsc::unbounded_channel();
        Self {
            config: config.validated(),
            next_room_id: 1,
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            removals_tx,
            removals_rx,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a new room and returns its ID.
    pub fn create_room(&mut self) -> RoomId {
        let room_id = RoomId(self.next_room_id);
        self.next_room_id += 1;
        let handle = spawn_room(room_id, self.config.clone(), self.removals_tx.clone());
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Admits a connection.
    ///
    /// A `requested` identity known to some room is resumed there, unless
    /// another connection still holds it, which fails with
    /// [`RoomError::IdentityInUse`]. Any other identity, or a freshly
    /// minted one if none was requested, joins the first room with
    /// capacity, creating one if all are full.
    pub async fn join(
        &mut self,
        conn: ConnectionId,
        requested: Option<PlayerId>,
        outbox: Outbox,
    ) -> Result<(RoomHandle, JoinOutcome), RoomError> {
        self.sync_removals();

        let player_id = match requested {
            Some(player_id) => player_id,
            None => mint_player_id(),
        };

        if let Some(handle) = self.room_of(&player_id) {
            match handle.join(conn, player_id.clone(), outbox.clone()).await {
                Ok(outcome) => return Ok((handle, outcome)),
                Err(err @ RoomError::IdentityInUse(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!(%player_id, error = %err, "rejoin failed, finding another room");
                    self.player_rooms.remove(&player_id);
                }
            }
        }

        self.join_or_create(conn, player_id, outbox).await
    }

    /// Joins the first room with a free slot, or a new room if none has
    /// one.
    pub async fn join_or_create(
        &mut self,
        conn: ConnectionId,
        player_id: PlayerId,
        outbox: Outbox,
    ) -> Result<(RoomHandle, JoinOutcome), RoomError> {
        let mut handles: Vec<RoomHandle> = self.rooms.values().cloned().collect();
        handles.sort_by_key(RoomHandle::room_id);

        for handle in handles {
            let Ok(info) = handle.get_info().await else {
                continue;
            };
            if !info.has_capacity() {
                continue;
            }
            // The room may have filled since `get_info`; keep looking.
            if let Ok(outcome) = handle.join(conn, player_id.clone(), outbox.clone()).await {
                self.player_rooms.insert(player_id, info.room_id);
                return Ok((handle, outcome));
            }
        }

        let room_id = self.create_room();
        let handle = self
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound(room_id))?;
        let outcome = handle.join(conn, player_id.clone(), outbox).await?;
        self.player_rooms.insert(player_id, room_id);
        Ok((handle, outcome))
    }

    fn room_of(&self, player_id: &PlayerId) -> Option<RoomHandle> {
        let room_id = self.player_rooms.get(player_id)?;
        self.rooms.get(room_id).cloned()
    }

    /// Forgets players their rooms have permanently removed.
    fn sync_removals(&mut self) {
        while let Ok((room_id, player_id)) = self.removals_rx.try_recv() {
            if self.player_rooms.get(&player_id) == Some(&room_id) {
                self.player_rooms.remove(&player_id);
                tracing::debug!(%room_id, %player_id, "forgot removed player");
            }
        }
    }

    /// The room a player identity currently lives in.
    pub fn player_room(&mut self, player_id: &PlayerId) -> Option<RoomId> {
        self.sync_removals();
        self.player_rooms.get(player_id).copied()
    }

    pub fn handle(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.get(&room_id).cloned()
    }

    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        handle.get_info().await
    }

    /// Info for every room that still answers, ordered by id.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(info) = handle.get_info().await {
                infos.push(info);
            }
        }
        infos.sort_by_key(|info| info.room_id);
        infos
    }

    /// Shuts down a room and forgets its players.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        let _ = handle.shutdown().await;
        self.player_rooms.retain(|_, rid| *rid != room_id);
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<_> = self.rooms.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
