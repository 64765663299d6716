use std::path::PathBuf;

/// Errors raised by the link transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint string is neither `unix:PATH`, `tcp:HOST:PORT`, nor a
    /// recognizable bare form.
    #[error("invalid endpoint '{0}' (expected unix:PATH or tcp:HOST:PORT)")]
    InvalidEndpoint(String),

    /// A socket path exceeds the platform's `sun_path` capacity.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Binding a listener at the endpoint failed.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Dialing the endpoint failed.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Taking a queued connection off the listener failed.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Any other I/O failure on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
