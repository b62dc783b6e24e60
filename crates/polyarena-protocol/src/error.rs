//! Error types for the protocol layer.
//!
//! Each polyarena crate has its own error enum, so a `ProtocolError` always
//! means "these bytes could not become a valid message", never a network
//! or room problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `"type"`, a
    /// missing required field, or a field of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but violates protocol rules, e.g. a position
    /// action without coordinates or a color that isn't `#RRGGBB`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
