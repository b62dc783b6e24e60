//! Wire protocol for polyarena.
//!
//! - **Types** ([`PlayerId`], [`ShapeId`], [`Vec2`], [`Color`],
//!   [`Recipient`]) — identities and values shared by every layer.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]) — the JSON that
//!   travels on the wire.
//! - **Commands** ([`Command`]) — the closed, validated set of requests
//!   the room layer acts on.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — bytes ↔ messages.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage → Command) → Room (entities)
//! ```

mod codec;
mod command;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use command::{Command, ShapeMove};
pub use error::ProtocolError;
pub use message::{
    ActionRequest, AuthoritativeAction, ClientMessage, ServerMessage,
    ShapeReport, ShapeState,
};
pub use types::{
    Color, MAX_PLAYER_ID_LEN, PlayerId, Recipient, RoomId, ShapeId, Vec2,
    server_time_millis,
};
