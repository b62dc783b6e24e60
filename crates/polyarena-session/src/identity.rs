//! Random identifiers for players and shapes.

use polyarena_protocol::PlayerId;
use rand::Rng;

/// Bytes of randomness in a minted player id (128 bits).
const PLAYER_ID_BYTES: usize = 16;

/// Generates a random lowercase hex string from `bytes` random bytes.
///
/// Randomness alone doesn't make an id unique; callers that store ids
/// must still check for collisions.
pub fn generate_token(bytes: usize) -> String {
    let mut rng = rand::rng();
    (0..bytes)
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}

/// Mints a fresh durable player identity for a client that joined
/// without asking for one.
pub fn mint_player_id() -> PlayerId {
    PlayerId(generate_token(PLAYER_ID_BYTES))
}
