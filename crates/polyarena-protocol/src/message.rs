//! Wire messages: what clients send and what the server sends back.
//!
//! Every message is a JSON object tagged by its `"type"` field, e.g.
//! `{"type":"remove_shape","shapeId":"s-1"}`. These types describe the
//! *shape* of the JSON only; semantic checks happen when a
//! [`ClientMessage`] is turned into a [`Command`](crate::Command).

use serde::{Deserialize, Serialize};

use crate::{Color, PlayerId, ShapeId, Vec2};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// One shape's reported kinematics inside a `shape_update` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeReport {
    pub id: ShapeId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub velocity: Option<Vec2>,
}

/// The `action` object of a `physics_action` message.
///
/// Coordinates are optional on the wire because the two action kinds need
/// different fields; [`Command`](crate::Command) enforces which are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ActionRequest {
    Position {
        shape_id: ShapeId,
        #[serde(default)]
        x: Option<f64>,
        #[serde(default)]
        y: Option<f64>,
        #[serde(default)]
        angle: Option<f64>,
        #[serde(default)]
        velocity: Option<Vec2>,
    },
    Impulse {
        shape_id: ShapeId,
        #[serde(default)]
        velocity: Option<Vec2>,
    },
}

/// Everything a client may send.
///
/// Unknown `"type"` tags and mistyped fields fail deserialization, which
/// the room layer treats as a malformed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// First message on a connection. `player_id` asks to resume an
    /// existing identity; without it the server mints a new one.
    Join {
        #[serde(default)]
        player_id: Option<String>,
    },
    ShapeUpdate {
        shapes: Vec<ShapeReport>,
    },
    PhysicsAction {
        action: ActionRequest,
    },
    CreateShape {},
    RemoveShape {
        shape_id: ShapeId,
    },
    ChangeBlockColor {
        color: String,
    },
    Ping {},
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// The authoritative version of a physics action, after validation and
/// clamping. This is what other clients should apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum AuthoritativeAction {
    Position {
        shape_id: ShapeId,
        x: f64,
        y: f64,
        angle: f64,
        velocity: Vec2,
    },
    Impulse {
        shape_id: ShapeId,
        velocity: Vec2,
    },
}

/// Replicated view of one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeState {
    pub id: ShapeId,
    pub owner: PlayerId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub velocity: Vec2,
    pub color: Color,
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent to a connection once its join is accepted. Carries the durable
    /// id to present on reconnect plus a full snapshot of the arena.
    Joined {
        player_id: PlayerId,
        reconnected: bool,
        shapes: Vec<ShapeState>,
    },
    PhysicsAction {
        player_id: PlayerId,
        shape_id: ShapeId,
        action: AuthoritativeAction,
        server_timestamp: u64,
    },
    BlockColorChanged {
        player_id: PlayerId,
        color: Color,
    },
    PlayerRemoved {
        player_id: PlayerId,
    },
    /// Replication delta: shapes that changed since the last flush and
    /// shapes that no longer exist.
    State {
        shapes: Vec<ShapeState>,
        removed: Vec<ShapeId>,
    },
    Pong {
        timestamp: u64,
    },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what browser clients parse, so these tests
    //! pin field names and tags rather than round-tripping every variant.

    use super::*;

    #[test]
    fn test_client_remove_shape_uses_camel_case_field() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"remove_shape","shapeId":"s-1"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::RemoveShape {
                shape_id: ShapeId::from("s-1")
            }
        );
    }

    #[test]
    fn test_client_create_shape_and_ping_accept_empty_objects() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"create_shape"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CreateShape {});

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping {});
    }

    #[test]
    fn test_client_join_player_id_is_optional() {
        let fresh: ClientMessage =
            serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert_eq!(fresh, ClientMessage::Join { player_id: None });

        let resume: ClientMessage =
            serde_json::from_str(r#"{"type":"join","playerId":"p-7"}"#)
                .unwrap();
        assert_eq!(
            resume,
            ClientMessage::Join {
                player_id: Some("p-7".into())
            }
        );
    }

    #[test]
    fn test_client_physics_action_position_parses_nested_tag() {
        let json = r#"{
            "type": "physics_action",
            "action": {
                "type": "position",
                "shapeId": "s-1",
                "x": 10.5, "y": 20.0, "angle": 0.25,
                "velocity": { "x": 1.0, "y": -2.0 }
            }
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::PhysicsAction {
                action:
                    ActionRequest::Position {
                        shape_id,
                        x,
                        y,
                        angle,
                        velocity,
                    },
            } => {
                assert_eq!(shape_id, ShapeId::from("s-1"));
                assert_eq!(x, Some(10.5));
                assert_eq!(y, Some(20.0));
                assert_eq!(angle, Some(0.25));
                assert_eq!(velocity, Some(Vec2::new(1.0, -2.0)));
            }
            other => panic!("expected position action, got {other:?}"),
        }
    }

    #[test]
    fn test_client_shape_update_batch_parses() {
        let json = r#"{"type":"shape_update","shapes":[
            {"id":"a","x":1,"y":2,"angle":0,"velocity":{"x":0,"y":0}},
            {"id":"b","x":3,"y":4}
        ]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let ClientMessage::ShapeUpdate { shapes } = msg else {
            panic!("expected shape_update");
        };
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].velocity, None);
    }

    #[test]
    fn test_client_unknown_type_fails() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"fly_to_moon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_mistyped_field_fails() {
        let result: Result<ClientMessage, _> = serde_json::from_str(
            r#"{"type":"remove_shape","shapeId":42}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_server_physics_action_json_format() {
        let msg = ServerMessage::PhysicsAction {
            player_id: PlayerId::from("p-1"),
            shape_id: ShapeId::from("s-1"),
            action: AuthoritativeAction::Position {
                shape_id: ShapeId::from("s-1"),
                x: 1.0,
                y: 2.0,
                angle: 0.0,
                velocity: Vec2::ZERO,
            },
            server_timestamp: 1234,
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "physics_action");
        assert_eq!(json["playerId"], "p-1");
        assert_eq!(json["shapeId"], "s-1");
        assert_eq!(json["serverTimestamp"], 1234);
        assert_eq!(json["action"]["type"], "position");
        assert_eq!(json["action"]["shapeId"], "s-1");
        assert_eq!(json["action"]["velocity"]["x"], 0.0);
    }

    #[test]
    fn test_server_color_and_removal_json_format() {
        let json = serde_json::to_value(&ServerMessage::BlockColorChanged {
            player_id: PlayerId::from("p-1"),
            color: Color::parse("#00ff00").unwrap(),
        })
        .unwrap();
        assert_eq!(json["type"], "block_color_changed");
        assert_eq!(json["color"], "#00ff00");

        let json = serde_json::to_value(&ServerMessage::PlayerRemoved {
            player_id: PlayerId::from("p-1"),
        })
        .unwrap();
        assert_eq!(json["type"], "player_removed");
        assert_eq!(json["playerId"], "p-1");
    }

    #[test]
    fn test_server_pong_json_format() {
        let json =
            serde_json::to_value(&ServerMessage::Pong { timestamp: 99 })
                .unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong", "timestamp": 99}));
    }
}
