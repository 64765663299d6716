//! Session handshake, acknowledgment tracking, and transfer engine.
//!
//! This is the protocol core of seqlink. A [`Transfer`] binds one live
//! connection to one [`Session`]; the session's send queue, progress
//! markers, and demultiplexer state outlive the connection, so a peer that
//! reconnects with its recovery key resumes exactly where it stopped —
//! including which inbound message was interrupted mid-receive and which
//! sends still await acknowledgment.

pub mod connector;
pub mod error;
pub mod handshake;
pub mod header;
pub mod listener;
pub mod queue;
pub mod session;
pub mod transfer;

pub use connector::connect;
pub use error::{Result, TransferError};
pub use handshake::{Handshake, HandshakeState, HandshakeStep};
pub use header::{
    HandshakeHeader, HandshakeKind, ParsingError, TransferHeader, TransferKind,
    TRANSFER_RESERVED_FIELDS,
};
pub use listener::TransferListener;
pub use queue::{AckCallback, MsgId, PendingSend, SendQueue, Seq};
pub use session::{Progress, Session, SessionError, SessionKey, SessionManager};
pub use transfer::Transfer;
