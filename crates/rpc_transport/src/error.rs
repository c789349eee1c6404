//! Errors raised while setting up the transport.
//!
//! Failures of individual calls are reported as [`colyseus_core::RpcError`].

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding, accepting or handshaking failed.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
