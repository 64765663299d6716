use crate::header::ParsingError;
use crate::session::SessionError;

/// Errors that can occur in peer transfer operations.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] seqlink_transport::TransportError),

    /// Pack codec or demultiplexer error.
    #[error("pack error: {0}")]
    Pack(#[from] seqlink_pack::PackError),

    /// A reserved header field was missing or malformed.
    #[error("header parsing failed: {0}")]
    Parsing(#[from] ParsingError),

    /// Session recovery or creation failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The remote peer rejected the handshake.
    #[error("handshake rejected by remote peer")]
    HandshakeRejected,

    /// The handshake was used out of order or failed locally.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// A newer transfer took over this transfer's session wiring.
    #[error("transfer detached from session '{0}'")]
    Detached(String),

    /// An I/O error occurred on the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransferError>;
