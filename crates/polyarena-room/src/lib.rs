//! The authoritative core of a polyarena room.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns all
//! of the room's state. Clients propose movement; the room decides what
//! actually happens and tells everyone else.
//!
//! # Key types
//!
//! - [`EntityStore`]: players and the shapes they own
//! - [`UpdateValidator`]: ownership checks and soft-clamping of moves
//! - [`Broadcaster`]: fan-out to connected participants
//! - [`LifecycleManager`]: joins, grace periods, boundary correction,
//!   inactivity sweeps
//! - [`Room`]: the synchronous aggregate tying those together
//! - [`RoomHandle`] / [`RoomManager`]: the async surface

mod actor;
mod broadcast;
mod config;
mod error;
mod lifecycle;
mod manager;
mod replication;
mod room;
mod store;
mod validator;

pub use actor::RoomHandle;
pub use broadcast::{Broadcaster, Outbox, position_of};
pub use config::{ArenaConfig, LifecycleConfig, RoomConfig};
pub use error::{Rejection, RoomError};
pub use lifecycle::{JoinOutcome, LifecycleManager, Maintenance};
pub use manager::RoomManager;
pub use replication::Replication;
pub use room::{Room, RoomInfo, World};
pub use store::{EntityStore, PlayerSession, Shape};
pub use validator::{Reconciled, UpdateValidator};
