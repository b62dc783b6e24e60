/// Errors that can occur in the transport layer.
///
/// Library errors from the socket stack are flattened to strings so this
/// type does not depend on which transport features are enabled.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The listener failed to hand out a new TCP stream.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// A TCP peer connected but never completed the WebSocket upgrade.
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_names_address() {
        let err = TransportError::Bind {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("cannot listen on 127.0.0.1:1"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
