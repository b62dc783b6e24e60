//! End-to-end tests: real WebSocket clients against a running server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use polyarena::prelude::*;
use polyarena::protocol::ShapeState;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = PolyarenaServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next application message, or `None` once the server closed the socket.
async fn recv(ws: &mut ClientWs) -> Option<ServerMessage> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for the server")?;
        match frame {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(text.as_str()).expect("decode"));
            }
            Ok(Message::Binary(data)) => {
                return Some(serde_json::from_slice(&data).expect("decode"));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Receives until a message matches, skipping replication deltas and the
/// like.
async fn recv_matching(
    ws: &mut ClientWs,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = recv(ws).await.expect("connection closed early");
        if pred(&msg) {
            return msg;
        }
    }
}

/// Joins and returns the `joined` payload.
async fn join(ws: &mut ClientWs, player_id: Option<&str>) -> (PlayerId, bool, Vec<ShapeState>) {
    let msg = match player_id {
        Some(id) => json!({"type": "join", "playerId": id}),
        None => json!({"type": "join"}),
    };
    send_json(ws, msg).await;
    match recv_matching(ws, |m| matches!(m, ServerMessage::Joined { .. })).await {
        ServerMessage::Joined {
            player_id,
            reconnected,
            shapes,
        } => (player_id, reconnected, shapes),
        _ => unreachable!(),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_without_id_mints_identity() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player_id, reconnected, shapes) = join(&mut ws, None).await;

    assert!(!player_id.as_str().is_empty());
    assert!(!reconnected);
    assert_eq!(shapes.len(), 1);
    assert_eq!(shapes[0].owner, player_id);
}

#[tokio::test]
async fn test_join_with_requested_id() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player_id, _, _) = join(&mut ws, Some("alice")).await;

    assert_eq!(player_id, PlayerId::from("alice"));
}

#[tokio::test]
async fn test_ping_pong() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, Some("alice")).await;

    send_json(&mut ws, json!({"type": "ping"})).await;

    let pong = recv_matching(&mut ws, |m| matches!(m, ServerMessage::Pong { .. })).await;
    let ServerMessage::Pong { timestamp } = pong else {
        unreachable!()
    };
    assert!(timestamp > 0);
}

#[tokio::test]
async fn test_malformed_message_is_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, Some("alice")).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    send_json(&mut ws, json!({"type": "teleport"})).await;
    send_json(&mut ws, json!({"type": "change_block_color", "color": "red"})).await;
    send_json(&mut ws, json!({"type": "ping"})).await;

    // Still connected and served.
    recv_matching(&mut ws, |m| matches!(m, ServerMessage::Pong { .. })).await;
}

#[tokio::test]
async fn test_first_message_must_be_join() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({"type": "ping"})).await;

    assert!(recv(&mut ws).await.is_none());
}

#[tokio::test]
async fn test_physics_action_relayed_to_other_players() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let (alice_id, _, shapes) = join(&mut alice, Some("alice")).await;
    join(&mut bob, Some("bob")).await;
    let shape = &shapes[0];

    send_json(
        &mut alice,
        json!({
            "type": "physics_action",
            "action": {
                "type": "position",
                "shapeId": shape.id,
                "x": shape.x + 1.0,
                "y": shape.y,
            }
        }),
    )
    .await;

    let relayed =
        recv_matching(&mut bob, |m| matches!(m, ServerMessage::PhysicsAction { .. })).await;
    let ServerMessage::PhysicsAction {
        player_id,
        shape_id,
        server_timestamp,
        ..
    } = relayed
    else {
        unreachable!()
    };
    assert_eq!(player_id, alice_id);
    assert_eq!(shape_id, shape.id);
    assert!(server_timestamp > 0);
}

#[tokio::test]
async fn test_create_shape_replicates_to_everyone() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let (alice_id, _, _) = join(&mut alice, Some("alice")).await;
    join(&mut bob, Some("bob")).await;

    send_json(&mut alice, json!({"type": "create_shape"})).await;

    let owned_by_alice = |m: &ServerMessage| match m {
        ServerMessage::State { shapes, .. } => shapes.iter().any(|s| s.owner == alice_id),
        _ => false,
    };
    recv_matching(&mut bob, owned_by_alice).await;
}

#[tokio::test]
async fn test_reconnect_resumes_identity_and_shapes() {
    let addr = start_server().await;
    let mut first = connect(&addr).await;
    let (_, _, shapes_before) = join(&mut first, Some("alice")).await;
    first.close(None).await.unwrap();
    // Wait for the server's side of the close handshake so the leave has
    // been handed to the room.
    while recv(&mut first).await.is_some() {}
    drop(first);

    let (player_id, reconnected, shapes_after) = rejoin(&addr, "alice").await;

    assert_eq!(player_id, PlayerId::from("alice"));
    assert!(reconnected);
    assert_eq!(shapes_after.len(), 1);
    assert_eq!(shapes_after[0].id, shapes_before[0].id);
}

/// Joins as `player_id`, retrying while the server still sees the previous
/// connection as live.
async fn rejoin(addr: &str, player_id: &str) -> (PlayerId, bool, Vec<ShapeState>) {
    for _ in 0..20 {
        let mut ws = connect(addr).await;
        send_json(&mut ws, json!({"type": "join", "playerId": player_id})).await;
        while let Some(msg) = recv(&mut ws).await {
            if let ServerMessage::Joined {
                player_id,
                reconnected,
                shapes,
            } = msg
            {
                return (player_id, reconnected, shapes);
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("{player_id} could not rejoin");
}

#[tokio::test]
async fn test_second_connection_cannot_take_live_identity() {
    let addr = start_server().await;
    let mut first = connect(&addr).await;
    let mut bob = connect(&addr).await;
    let (alice_id, _, shapes) = join(&mut first, Some("alice")).await;
    join(&mut bob, Some("bob")).await;

    let mut second = connect(&addr).await;
    send_json(&mut second, json!({"type": "join", "playerId": alice_id})).await;

    // Refused: the server closes the socket without a `joined`.
    while let Some(msg) = recv(&mut second).await {
        assert!(!matches!(msg, ServerMessage::Joined { .. }));
    }

    // The original connection still owns the identity and its shape.
    send_json(
        &mut first,
        json!({
            "type": "physics_action",
            "action": {
                "type": "position",
                "shapeId": shapes[0].id,
                "x": shapes[0].x + 1.0,
                "y": shapes[0].y,
            }
        }),
    )
    .await;
    let relayed =
        recv_matching(&mut bob, |m| matches!(m, ServerMessage::PhysicsAction { .. })).await;
    assert!(matches!(
        relayed,
        ServerMessage::PhysicsAction { ref player_id, .. } if *player_id == alice_id
    ));
    send_json(&mut first, json!({"type": "ping"})).await;
    recv_matching(&mut first, |m| matches!(m, ServerMessage::Pong { .. })).await;
}
