//! Player identity and connection state for polyarena.
//!
//! 1. **Identity resolution** — which player a connection speaks for
//!    ([`SessionRegistry`])
//! 2. **Connection state** — active, in the reconnect grace period, or
//!    removed ([`ConnectionState`], [`SessionConfig`])
//! 3. **Identity minting** — fresh ids for new players ([`mint_player_id`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← resolves every inbound message through the registry
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, ConnectionId
//! ```

mod error;
mod identity;
mod registry;
mod session;

pub use error::SessionError;
pub use identity::{generate_token, mint_player_id};
pub use registry::SessionRegistry;
pub use session::{ConnectionState, SessionConfig};
