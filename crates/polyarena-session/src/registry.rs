//! The session registry: which connection speaks for which player.
//!
//! Every inbound message arrives tagged with a transient [`ConnectionId`].
//! Before anything touches the entity store, the room asks the registry
//! who that connection belongs to. A connection that resolves to nobody
//! has already left (or never joined) and its messages are dropped.
//!
//! # Concurrency note
//!
//! Like the rest of a room's state, the registry is owned by the room's
//! actor task and never shared, so plain `HashMap`s are enough.

use std::collections::HashMap;

use polyarena_protocol::PlayerId;
use polyarena_transport::ConnectionId;

/// Two-way map between live connections and durable player identities.
///
/// Invariant: the two maps are mirror images. A player is bound to at
/// most one connection and a connection to at most one player.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Connection → player, consulted on every inbound message.
    players: HashMap<ConnectionId, PlayerId>,

    /// Player → connection, consulted when addressing a specific player
    /// or excluding the sender from a broadcast.
    connections: HashMap<PlayerId, ConnectionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the player a connection speaks for, if any.
    pub fn resolve(&self, conn: ConnectionId) -> Option<&PlayerId> {
        self.players.get(&conn)
    }

    /// Binds `conn` to `player_id`.
    ///
    /// If the player was bound to another connection (a reconnect that
    /// raced the old socket's close, or a second tab), that connection is
    /// released and returned so the caller can stop talking to it.
    pub fn bind(
        &mut self,
        conn: ConnectionId,
        player_id: PlayerId,
    ) -> Option<ConnectionId> {
        // A connection speaks for one player only.
        self.unbind(conn);

        let previous = self.connections.insert(player_id.clone(), conn);
        if let Some(old) = previous {
            self.players.remove(&old);
            tracing::debug!(
                %player_id,
                old_conn = %old,
                new_conn = %conn,
                "player rebound to new connection"
            );
        }
        self.players.insert(conn, player_id);
        previous
    }

    /// Releases a connection. Returns the player it was bound to.
    pub fn unbind(&mut self, conn: ConnectionId) -> Option<PlayerId> {
        let player_id = self.players.remove(&conn)?;
        // Only drop the reverse entry if it still points at this
        // connection; a rebind may already have replaced it.
        if self.connections.get(&player_id) == Some(&conn) {
            self.connections.remove(&player_id);
        }
        Some(player_id)
    }

    /// Releases whatever connection a player is bound to.
    pub fn unbind_player(
        &mut self,
        player_id: &PlayerId,
    ) -> Option<ConnectionId> {
        let conn = self.connections.remove(player_id)?;
        self.players.remove(&conn);
        Some(conn)
    }

    /// The connection currently bound to `player_id`.
    pub fn connection_of(&self, player_id: &PlayerId) -> Option<ConnectionId> {
        self.connections.get(player_id).copied()
    }

    /// All bound connections, in no particular order.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.players.keys().copied()
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
