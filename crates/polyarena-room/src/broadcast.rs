//! Fan-out of accepted and corrected state to connected participants.
//!
//! Each connection handler gives the room an unbounded outbox. Sending
//! never blocks the room and never fails it: a closed outbox just means
//! the connection is on its way out, and the lifecycle layer will detach
//! it shortly. Messages to one connection arrive in the order the room
//! accepted the changes behind them.

use std::collections::BTreeMap;

use polyarena_protocol::{
    AuthoritativeAction, Color, PlayerId, Recipient, RoomId, ServerMessage,
    ShapeId, server_time_millis,
};
use polyarena_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::Shape;

/// Channel a room uses to reach one connection.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug)]
pub struct Broadcaster {
    room_id: RoomId,
    /// Ordered so fan-out order is stable.
    outboxes: BTreeMap<ConnectionId, Outbox>,
}

impl Broadcaster {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            outboxes: BTreeMap::new(),
        }
    }

    /// Starts delivering to `conn`. Replaces any earlier outbox for it.
    pub fn attach(&mut self, conn: ConnectionId, outbox: Outbox) {
        self.outboxes.insert(conn, outbox);
    }

    /// Stops delivering to `conn`. Returns `false` if it wasn't attached.
    pub fn detach(&mut self, conn: ConnectionId) -> bool {
        self.outboxes.remove(&conn).is_some()
    }

    pub fn is_attached(&self, conn: ConnectionId) -> bool {
        self.outboxes.contains_key(&conn)
    }

    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    /// Sends `msg` to one connection.
    pub fn send_to(&self, conn: ConnectionId, msg: ServerMessage) {
        if let Some(outbox) = self.outboxes.get(&conn) {
            if outbox.send(msg).is_err() {
                tracing::trace!(room_id = %self.room_id, %conn, "outbox closed, message dropped");
            }
        }
    }

    /// Sends `msg` to every connection `recipient` covers.
    pub fn dispatch(&self, recipient: Recipient, msg: ServerMessage) {
        if let Recipient::Connection(conn) = recipient {
            self.send_to(conn, msg);
            return;
        }
        for (&conn, outbox) in &self.outboxes {
            if recipient.includes(conn) && outbox.send(msg.clone()).is_err() {
                tracing::trace!(room_id = %self.room_id, %conn, "outbox closed, message dropped");
            }
        }
    }

    /// Relays an accepted action to everyone except the connection it came
    /// from.
    pub fn propagate(
        &self,
        origin: ConnectionId,
        player_id: &PlayerId,
        shape_id: &ShapeId,
        action: AuthoritativeAction,
    ) {
        let msg = ServerMessage::PhysicsAction {
            player_id: player_id.clone(),
            shape_id: shape_id.clone(),
            action,
            server_timestamp: server_time_millis(),
        };
        self.dispatch(Recipient::AllExcept(origin), msg);
    }

    /// Announces a server-side correction of `shape` to everyone,
    /// owner included.
    pub fn correct(&self, shape: &Shape) {
        let msg = ServerMessage::PhysicsAction {
            player_id: shape.owner.clone(),
            shape_id: shape.id.clone(),
            action: position_of(shape),
            server_timestamp: server_time_millis(),
        };
        self.dispatch(Recipient::All, msg);
    }

    pub fn color_changed(&self, origin: ConnectionId, player_id: &PlayerId, color: Color) {
        let msg = ServerMessage::BlockColorChanged {
            player_id: player_id.clone(),
            color,
        };
        self.dispatch(Recipient::AllExcept(origin), msg);
    }

    pub fn player_removed(&self, player_id: &PlayerId) {
        let msg = ServerMessage::PlayerRemoved {
            player_id: player_id.clone(),
        };
        self.dispatch(Recipient::All, msg);
    }
}

/// A shape's full kinematic state as a `position` action.
pub fn position_of(shape: &Shape) -> AuthoritativeAction {
    AuthoritativeAction::Position {
        shape_id: shape.id.clone(),
        x: shape.position.x,
        y: shape.position.y,
        angle: shape.angle,
        velocity: shape.velocity,
    }
}
