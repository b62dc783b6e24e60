//! # polyarena
//!
//! A server-authoritative arena where every player owns a handful of
//! shapes. Clients simulate locally and report; the server validates each
//! report against the arena rules, relays accepted actions to everyone
//! else, and replicates the authoritative state at a fixed tick rate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polyarena::prelude::*;
//!
//! # async fn run() -> Result<(), PolyarenaError> {
//! let server = PolyarenaServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PolyarenaError;
pub use server::{HeartbeatConfig, PolyarenaServer, PolyarenaServerBuilder, ServerConfig};

pub use polyarena_protocol as protocol;
pub use polyarena_room as room;

pub mod prelude {
    pub use crate::{HeartbeatConfig, PolyarenaError, PolyarenaServer, ServerConfig};
    pub use polyarena_protocol::{ClientMessage, PlayerId, RoomId, ServerMessage};
    pub use polyarena_room::{ArenaConfig, LifecycleConfig, RoomConfig};
    pub use polyarena_session::SessionConfig;
}
