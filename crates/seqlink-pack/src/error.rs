/// Errors that can occur during pack encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// The pack header contains an invalid magic number.
    #[error("invalid pack magic (expected 0x534C \"SL\")")]
    InvalidMagic,

    /// A header field carries an unknown tag byte.
    #[error("unknown header field tag 0x{tag:02X}")]
    UnknownFieldTag { tag: u8 },

    /// The header declares more fields than the protocol allows.
    #[error("too many header fields ({count}, max {max})")]
    TooManyFields { count: usize, max: usize },

    /// A string header field exceeds the maximum length.
    #[error("header field too long ({len} bytes, max {max})")]
    FieldTooLong { len: usize, max: usize },

    /// A string header field is not valid UTF-8.
    #[error("header field is not valid UTF-8")]
    InvalidString,

    /// The body exceeds the configured maximum size.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packs.
    #[error("pack I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete pack was transferred.
    #[error("connection closed (incomplete pack)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, PackError>;
