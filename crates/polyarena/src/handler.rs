//! Per-connection handler: join, then pump messages both ways.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Wait for `join` → resolve the durable identity
//!   2. Join a room → the room sends `joined` through our outbox. A
//!      refused join (the identity is still connected elsewhere) closes
//!      the socket.
//!   3. Loop: relay inbound frames (`ping` included) to the room and room
//!      output to the socket, pinging on every heartbeat interval
//!   4. Tell the room the connection left

use std::sync::Arc;

use polyarena_protocol::{
    ClientMessage, Codec, PlayerId, ProtocolError, RoomId, ServerMessage,
};
use polyarena_room::{Rejection, RoomHandle};
use polyarena_transport::{Connection, ConnectionId, Inbound, TransportError};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::PolyarenaError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: C,
    state: Arc<ServerState>,
) -> Result<(), PolyarenaError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let requested = await_join(&conn, &state).await?;

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let joined = {
        let mut rooms = state.rooms.lock().await;
        rooms.join(conn_id, requested, outbox).await
    };
    let (handle, outcome) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "join refused");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    tracing::info!(
        %conn_id,
        player_id = %outcome.player_id,
        room_id = %outcome.room_id,
        reconnected = outcome.reconnected,
        "player joined"
    );

    let result = pump(&conn, &state, &handle, &mut inbox).await;

    // The room ignores this if it no longer knows the connection.
    if let Err(e) = handle.leave(conn_id).await {
        tracing::debug!(%conn_id, error = %e, "room gone before leave");
    }
    tracing::info!(%conn_id, player_id = %outcome.player_id, "connection closed");
    result
}

/// Waits for the `join` message and returns the identity it asks for.
///
/// An unusable requested id is not fatal: the player simply gets a fresh
/// one.
async fn await_join<C>(
    conn: &C,
    state: &ServerState,
) -> Result<Option<PlayerId>, PolyarenaError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    let timeout = state.config.join_timeout;

    let first = async {
        loop {
            match conn.recv().await {
                Ok(Some(Inbound::Message(data))) => return Ok(Some(data)),
                Ok(Some(Inbound::Pong)) => continue,
                Ok(None) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    };
    let data: Vec<u8> = match tokio::time::timeout(timeout, first).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before join".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(PolyarenaError::Transport(e)),
        Err(_) => {
            let _ = conn.close().await;
            return Err(PolyarenaError::JoinTimeout(timeout));
        }
    };

    let requested = match state.codec.decode::<ClientMessage>(&data)? {
        ClientMessage::Join { player_id } => player_id,
        _ => {
            let _ = conn.close().await;
            return Err(ProtocolError::InvalidMessage(
                "first message must be join".into(),
            )
            .into());
        }
    };

    Ok(requested.and_then(|raw| match PlayerId::parse_requested(&raw) {
        Ok(player_id) => Some(player_id),
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "ignoring requested player id");
            None
        }
    }))
}

/// The steady-state loop. Returns once either side is done.
async fn pump<C>(
    conn: &C,
    state: &ServerState,
    handle: &RoomHandle,
    inbox: &mut mpsc::UnboundedReceiver<ServerMessage>,
) -> Result<(), PolyarenaError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    let room_id = handle.room_id();
    let heartbeat_config = &state.config.heartbeat;

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + heartbeat_config.interval,
        heartbeat_config.interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            inbound = conn.recv() => match inbound {
                Ok(Some(Inbound::Message(data))) => {
                    missed = 0;
                    if !relay_inbound(conn, state, handle, room_id, &data).await? {
                        return Ok(());
                    }
                }
                Ok(Some(Inbound::Pong)) => missed = 0,
                Ok(None) => {
                    tracing::debug!(%conn_id, "closed by peer");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv failed");
                    return Ok(());
                }
            },

            outbound = inbox.recv() => match outbound {
                Some(msg) => send(conn, state, &msg).await?,
                // The room dropped our outbox: it shut down.
                None => {
                    tracing::info!(%conn_id, %room_id, "room closed the connection");
                    let _ = conn.close().await;
                    return Ok(());
                }
            },

            _ = heartbeat.tick() => {
                missed += 1;
                if missed >= heartbeat_config.max_missed {
                    tracing::info!(%conn_id, missed, "heartbeat timed out");
                    let _ = conn.close().await;
                    return Ok(());
                }
                conn.ping().await?;
            }
        }
    }
}

/// Decodes one inbound frame and acts on it. Returns `false` if the room
/// is gone and the connection should end.
async fn relay_inbound<C>(
    conn: &C,
    state: &ServerState,
    handle: &RoomHandle,
    room_id: RoomId,
    data: &[u8],
) -> Result<bool, PolyarenaError>
where
    C: Connection<Error = TransportError>,
{
    let conn_id = conn.id();
    match state.codec.decode::<ClientMessage>(data) {
        Ok(msg) => {
            if let Err(e) = handle.send_message(conn_id, msg).await {
                tracing::warn!(%conn_id, error = %e, "room unavailable");
                return Ok(false);
            }
        }
        Err(e) => Rejection::from(e).log(room_id, conn_id),
    }
    Ok(true)
}

async fn send<C>(conn: &C, state: &ServerState, msg: &ServerMessage) -> Result<(), PolyarenaError>
where
    C: Connection<Error = TransportError>,
{
    let bytes = state.codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}
