//! Validated commands: the closed set of things a joined client can ask for.
//!
//! A [`ClientMessage`] only guarantees the JSON had the right shape. A
//! [`Command`] additionally guarantees that every number is finite, that an
//! impulse carries a vector, and that a color is well formed. Nothing
//! downstream re-checks these.
//!
//! A position action may leave out either coordinate; the shape keeps its
//! current value on that axis.

use crate::{
    ActionRequest, ClientMessage, Color, ProtocolError, ShapeId, ShapeReport,
    Vec2,
};

/// A proposed move for one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMove {
    pub shape_id: ShapeId,
    /// `None` keeps the shape's current x.
    pub x: Option<f64>,
    /// `None` keeps the shape's current y.
    pub y: Option<f64>,
    /// `None` keeps the shape's current orientation.
    pub angle: Option<f64>,
    /// `None` keeps the shape's current velocity.
    pub velocity: Option<Vec2>,
}

/// A validated request from a joined client.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Batch of kinematics reports (`shape_update`).
    UpdateShapes(Vec<ShapeMove>),
    /// A `physics_action` of type `position`.
    Move(ShapeMove),
    /// A `physics_action` of type `impulse`: a velocity delta.
    Impulse { shape_id: ShapeId, impulse: Vec2 },
    CreateShape,
    RemoveShape(ShapeId),
    ChangeColor(Color),
    Ping,
}

impl TryFrom<ClientMessage> for Command {
    type Error = ProtocolError;

    fn try_from(msg: ClientMessage) -> Result<Self, Self::Error> {
        match msg {
            ClientMessage::Join { .. } => Err(ProtocolError::InvalidMessage(
                "join is only valid as the first message".into(),
            )),
            ClientMessage::ShapeUpdate { shapes } => shapes
                .into_iter()
                .map(ShapeMove::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Command::UpdateShapes),
            ClientMessage::PhysicsAction { action } => match action {
                ActionRequest::Position {
                    shape_id,
                    x,
                    y,
                    angle,
                    velocity,
                } => {
                    ShapeMove {
                        shape_id,
                        x,
                        y,
                        angle,
                        velocity,
                    }
                    .checked()
                    .map(Command::Move)
                }
                ActionRequest::Impulse { shape_id, velocity } => {
                    match velocity {
                        Some(impulse) if impulse.is_finite() => {
                            Ok(Command::Impulse { shape_id, impulse })
                        }
                        Some(_) => Err(non_finite()),
                        None => Err(ProtocolError::InvalidMessage(
                            "impulse action requires velocity".into(),
                        )),
                    }
                }
            },
            ClientMessage::CreateShape {} => Ok(Command::CreateShape),
            ClientMessage::RemoveShape { shape_id } => {
                Ok(Command::RemoveShape(shape_id))
            }
            ClientMessage::ChangeBlockColor { color } => {
                Color::parse(&color).map(Command::ChangeColor)
            }
            ClientMessage::Ping {} => Ok(Command::Ping),
        }
    }
}

impl TryFrom<ShapeReport> for ShapeMove {
    type Error = ProtocolError;

    fn try_from(report: ShapeReport) -> Result<Self, Self::Error> {
        ShapeMove {
            shape_id: report.id,
            x: Some(report.x),
            y: Some(report.y),
            angle: report.angle,
            velocity: report.velocity,
        }
        .checked()
    }
}

impl ShapeMove {
    /// The proposed position, filling missing coordinates from `current`.
    pub fn target(&self, current: Vec2) -> Vec2 {
        Vec2::new(self.x.unwrap_or(current.x), self.y.unwrap_or(current.y))
    }

    fn checked(self) -> Result<Self, ProtocolError> {
        let finite = self.x.is_none_or(f64::is_finite)
            && self.y.is_none_or(f64::is_finite)
            && self.angle.is_none_or(f64::is_finite)
            && self.velocity.is_none_or(|v| v.is_finite());
        if finite { Ok(self) } else { Err(non_finite()) }
    }
}

fn non_finite() -> ProtocolError {
    ProtocolError::InvalidMessage("non-finite number".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(x: Option<f64>, y: Option<f64>) -> ClientMessage {
        ClientMessage::PhysicsAction {
            action: ActionRequest::Position {
                shape_id: ShapeId::from("s-1"),
                x,
                y,
                angle: None,
                velocity: None,
            },
        }
    }

    #[test]
    fn test_try_from_position_with_coordinates_is_move() {
        let cmd = Command::try_from(position(Some(1.0), Some(2.0))).unwrap();
        assert_eq!(
            cmd,
            Command::Move(ShapeMove {
                shape_id: ShapeId::from("s-1"),
                x: Some(1.0),
                y: Some(2.0),
                angle: None,
                velocity: None,
            })
        );
    }

    #[test]
    fn test_try_from_position_missing_coordinate_keeps_current() {
        let Command::Move(mv) = Command::try_from(position(Some(1.0), None)).unwrap() else {
            panic!("expected a move");
        };
        assert_eq!(mv.target(Vec2::new(7.0, 8.0)), Vec2::new(1.0, 8.0));

        let Command::Move(mv) = Command::try_from(position(None, None)).unwrap() else {
            panic!("expected a move");
        };
        assert_eq!(mv.target(Vec2::new(7.0, 8.0)), Vec2::new(7.0, 8.0));
    }

    #[test]
    fn test_try_from_position_non_finite_coordinate_is_invalid() {
        assert!(Command::try_from(position(Some(f64::NAN), None)).is_err());
        assert!(Command::try_from(position(None, Some(f64::INFINITY))).is_err());
    }

    #[test]
    fn test_try_from_impulse_requires_velocity() {
        let msg = ClientMessage::PhysicsAction {
            action: ActionRequest::Impulse {
                shape_id: ShapeId::from("s-1"),
                velocity: None,
            },
        };
        assert!(Command::try_from(msg).is_err());
    }

    #[test]
    fn test_try_from_shape_update_rejects_whole_batch_on_non_finite() {
        // serde_json never produces NaN, but other codecs could.
        let msg = ClientMessage::ShapeUpdate {
            shapes: vec![
                ShapeReport {
                    id: ShapeId::from("a"),
                    x: 1.0,
                    y: 1.0,
                    angle: None,
                    velocity: None,
                },
                ShapeReport {
                    id: ShapeId::from("b"),
                    x: 1.0,
                    y: 1.0,
                    angle: None,
                    velocity: Some(Vec2::new(f64::INFINITY, 0.0)),
                },
            ],
        };
        assert!(Command::try_from(msg).is_err());
    }

    #[test]
    fn test_try_from_color_validates_hex() {
        let ok = ClientMessage::ChangeBlockColor {
            color: "#12abEF".into(),
        };
        assert!(matches!(
            Command::try_from(ok),
            Ok(Command::ChangeColor(_))
        ));

        let bad = ClientMessage::ChangeBlockColor {
            color: "red".into(),
        };
        assert!(Command::try_from(bad).is_err());
    }

    #[test]
    fn test_try_from_join_after_handshake_is_invalid() {
        let msg = ClientMessage::Join { player_id: None };
        assert!(Command::try_from(msg).is_err());
    }
}
