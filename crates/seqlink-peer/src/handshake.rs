//! Session establishment and recovery.
//!
//! One handshake runs per connection, before any transfer wiring exists.
//! The initiator writes a REQUEST (carrying a recovery key iff resuming)
//! and waits for ESTABLISHED or ERROR; the responder recovers or creates
//! the session and replies. Either way the attempt resolves to exactly one
//! terminal step.

use std::io::{ErrorKind, Read, Write};

use seqlink_pack::{Pack, PackWriter, UnpackEvent, Unpacker};
use tracing::{debug, error};

use crate::error::{Result, TransferError};
use crate::header::{HandshakeHeader, HandshakeKind};
use crate::session::{Session, SessionKey, SessionManager};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Handshake progression. `Established` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    AwaitPeer,
    Established,
    Failed,
}

/// Terminal outcome of processing an inbound handshake pack.
///
/// `reply`, when present, is the single pack to write back — at most one
/// outbound pack per inbound pack processed.
#[derive(Debug)]
pub enum HandshakeStep {
    Established {
        session: Session,
        reply: Option<Pack>,
    },
    Failed {
        reply: Option<Pack>,
        error: TransferError,
    },
}

/// Per-connection handshake state machine.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    key: Option<SessionKey>,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::Init,
            key: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Open the handshake as initiator: returns the REQUEST pack to write.
    /// Field 1 carries `key` iff resuming a previous session.
    pub fn begin(&mut self, key: Option<SessionKey>) -> Result<Pack> {
        if self.state != HandshakeState::Init {
            return Err(TransferError::HandshakeFailed(
                "handshake already begun".to_string(),
            ));
        }
        self.key = key;
        self.state = HandshakeState::AwaitPeer;
        Ok(HandshakeHeader::request(self.key.as_ref()))
    }

    /// Process one inbound handshake pack, dispatching on its kind.
    ///
    /// Session failures are caught here and folded into the terminal step
    /// (a wire ERROR reply on the responder side, a silent local failure on
    /// the initiator side) — they are never raised through this call.
    pub fn on_pack(&mut self, pack: &Pack, manager: &SessionManager) -> Result<HandshakeStep> {
        if matches!(
            self.state,
            HandshakeState::Established | HandshakeState::Failed
        ) {
            return Err(TransferError::HandshakeFailed(
                "handshake already resolved".to_string(),
            ));
        }

        let header = HandshakeHeader::parse(pack)?;
        match header.kind() {
            // Responder role: recover the presented key or mint a session.
            HandshakeKind::Request => match manager.start(header.key()) {
                Ok(session) => {
                    debug!(session = %session.key(), "handshake accepted");
                    self.state = HandshakeState::Established;
                    Ok(HandshakeStep::Established {
                        session,
                        reply: Some(HandshakeHeader::established()),
                    })
                }
                Err(err) => {
                    match header.key() {
                        Some(key) => error!(key = %key, "handshake: session recovery failed: {err}"),
                        None => error!("handshake: session creation failed: {err}"),
                    }
                    self.state = HandshakeState::Failed;
                    Ok(HandshakeStep::Failed {
                        reply: Some(HandshakeHeader::error()),
                        error: err.into(),
                    })
                }
            },

            // Initiator role: resolve the local session under the key we
            // sent in REQUEST. No wire reply either way.
            HandshakeKind::Established => match manager.start(self.key.as_ref()) {
                Ok(session) => {
                    debug!(session = %session.key(), "handshake established");
                    self.state = HandshakeState::Established;
                    Ok(HandshakeStep::Established {
                        session,
                        reply: None,
                    })
                }
                Err(err) => {
                    error!("handshake: unable to resolve local session: {err}");
                    self.state = HandshakeState::Failed;
                    Ok(HandshakeStep::Failed {
                        reply: None,
                        error: err.into(),
                    })
                }
            },

            // No reply to an ERROR: replying would ping-pong errors forever.
            HandshakeKind::Error => {
                error!("handshake rejected by remote peer");
                self.state = HandshakeState::Failed;
                Ok(HandshakeStep::Failed {
                    reply: None,
                    error: TransferError::HandshakeRejected,
                })
            }
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

/// Pump the connection until the handshake resolves.
///
/// Reads raw chunks into a transient unpacker; header events are irrelevant
/// at this stage. Writes the terminal step's reply, if any, and converts the
/// outcome into the single `Ok(session)` / `Err` signal of the attempt.
pub(crate) fn drive<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut PackWriter<W>,
    unpacker: &mut Unpacker,
    handshake: &mut Handshake,
    manager: &SessionManager,
) -> Result<Session> {
    loop {
        while let Some(event) = unpacker.poll()? {
            let UnpackEvent::Complete(pack) = event else {
                continue;
            };
            match handshake.on_pack(&pack, manager)? {
                HandshakeStep::Established { session, reply } => {
                    if let Some(reply) = reply {
                        writer.write_pack(&reply)?;
                    }
                    return Ok(session);
                }
                HandshakeStep::Failed { reply, error } => {
                    if let Some(reply) = reply {
                        writer.write_pack(&reply)?;
                    }
                    return Err(error);
                }
            }
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match reader.read(&mut chunk) {
            Ok(0) => return Err(TransferError::ConnectionClosed),
            Ok(read) => unpacker.feed(&chunk[..read]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransferError::Io(err)),
        }
    }
}
