//! Exit-code taxonomy and error-to-code mapping for the CLI.
//!
//! Every command resolves to a process exit code. Library errors are folded
//! layer by layer: transfer wraps pack and transport, both bottom out in
//! the shared `io_error` kind mapping.

use std::fmt;
use std::io;

use seqlink_pack::PackError;
use seqlink_peer::TransferError;
use seqlink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

/// A terminal CLI failure: the message for stderr plus the exit code.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn pack_error(context: &str, err: PackError) -> CliError {
    match err {
        PackError::Io(source) => io_error(context, source),
        PackError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        // Everything else is a malformed or over-limit pack.
        PackError::BodyTooLarge { .. }
        | PackError::FieldTooLong { .. }
        | PackError::TooManyFields { .. }
        | PackError::UnknownFieldTag { .. }
        | PackError::InvalidMagic
        | PackError::InvalidString => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn transfer_error(context: &str, err: TransferError) -> CliError {
    match err {
        TransferError::Transport(err) => transport_error(context, err),
        TransferError::Pack(err) => pack_error(context, err),
        TransferError::Io(err) => io_error(context, err),
        TransferError::Parsing(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        TransferError::Session(_)
        | TransferError::HandshakeRejected
        | TransferError::HandshakeFailed(_)
        | TransferError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
