//! The session-bound transfer engine.
//!
//! A `Transfer` wires one live connection to one session: inbound demux
//! events flow into acknowledgment handling and progress markers, outbound
//! sends flow through the pending queue and header stamping. The session —
//! queue, demultiplexer, markers — outlives the connection; a later
//! `Transfer` reattaches to it after a reconnect.

use std::io::{ErrorKind, Read, Write};

use seqlink_pack::{Pack, PackWriter, UnpackEvent, Unpacker};
use tracing::{debug, error, info};

use crate::error::{Result, TransferError};
use crate::handshake::{self, Handshake};
use crate::header::TransferHeader;
use crate::queue::{AckCallback, MsgId, Seq};
use crate::session::{Progress, Session, SessionKey, SessionManager, StateGuard};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Session-bound driver for one connection.
///
/// `reader` and `writer` are the two halves of the connection byte stream
/// (split via `try_clone` on socket types). All methods fail with
/// [`TransferError::Detached`] once a newer transfer has attached to the
/// same session.
pub struct Transfer<R, W: Write> {
    reader: R,
    writer: PackWriter<W>,
    session: Session,
    epoch: u64,
}

impl<R: Read, W: Write> Transfer<R, W> {
    /// Initiate a handshake and bind the resulting session.
    ///
    /// `key` resumes a previously issued session; `None` requests a fresh
    /// one. The `Ok` value is the established signal: the transfer is wired
    /// and [`Transfer::session`] exposes the adopted session.
    pub fn connect(
        reader: R,
        writer: W,
        manager: &SessionManager,
        key: Option<SessionKey>,
    ) -> Result<Self> {
        let mut reader = reader;
        let mut writer = PackWriter::new(writer);
        let mut unpacker = Unpacker::new();

        let mut hs = Handshake::new();
        let request = hs.begin(key)?;
        writer.write_pack(&request)?;

        let session = handshake::drive(&mut reader, &mut writer, &mut unpacker, &mut hs, manager)?;
        Ok(Self::adopt(reader, writer, unpacker, session))
    }

    /// Answer a peer's handshake and bind the resulting session.
    pub fn accept(reader: R, writer: W, manager: &SessionManager) -> Result<Self> {
        let mut reader = reader;
        let mut writer = PackWriter::new(writer);
        let mut unpacker = Unpacker::new();

        let mut hs = Handshake::new();
        let session = handshake::drive(&mut reader, &mut writer, &mut unpacker, &mut hs, manager)?;
        Ok(Self::adopt(reader, writer, unpacker, session))
    }

    /// Bind an already-resolved session to a connection, skipping the
    /// handshake. For custom establishment flows and tests.
    pub fn from_parts(reader: R, writer: W, session: Session) -> Self {
        Self::adopt(reader, PackWriter::new(writer), Unpacker::new(), session)
    }

    fn adopt(reader: R, writer: PackWriter<W>, mut handshake_unpacker: Unpacker, session: Session) -> Self {
        // Claiming the epoch detaches whatever transfer was wired to this
        // session's demultiplexer before us.
        let epoch = session.attach();

        // Bytes the handshake read past its last pack belong to the
        // transfer stage; move them into the session's own demultiplexer.
        let residual = handshake_unpacker.take_buffered();
        if !residual.is_empty() {
            if let Some(mut state) = session.attached(epoch) {
                state.feed(&residual);
            }
        }

        info!(session = %session.key(), "transfer established");
        Self {
            reader,
            writer,
            session,
            epoch,
        }
    }

    /// The session this transfer is bound to.
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn state(&self) -> Result<StateGuard<'_>> {
        self.session
            .attached(self.epoch)
            .ok_or_else(|| TransferError::Detached(self.session.key().as_str().to_string()))
    }

    /// Send a pack to the peer.
    ///
    /// The send is registered in the session queue before anything touches
    /// the wire; `on_ack` fires once when the matching ACK is processed.
    /// Returns the allocated (id, seq).
    pub fn send(&mut self, pack: Pack, on_ack: Option<AckCallback>) -> Result<(MsgId, Seq)> {
        let (id, seq) = self.state()?.enqueue(pack.clone(), on_ack);

        let mut wire = pack;
        TransferHeader::stamp_data(&mut wire, id, seq);
        self.writer.write_pack(&wire)?;
        debug!(session = %self.session.key(), id, seq, "data pack sent");
        Ok((id, seq))
    }

    /// Block until the next inbound data pack.
    ///
    /// ACKs are resolved internally (firing send callbacks); header events
    /// update the mid-receive marker. EOF yields
    /// [`TransferError::ConnectionClosed`]; the session stays intact for a
    /// later transfer to resume.
    pub fn recv(&mut self) -> Result<Pack> {
        loop {
            loop {
                let event = self.state()?.poll()?;
                match event {
                    Some(UnpackEvent::Header(pack)) => self.handle_header(&pack)?,
                    Some(UnpackEvent::Complete(pack)) => {
                        if let Some(data) = self.handle_complete(pack)? {
                            return Ok(data);
                        }
                    }
                    None => break,
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.reader.read(&mut chunk) {
                Ok(0) => return Err(TransferError::ConnectionClosed),
                Ok(read) => self.state()?.feed(&chunk[..read]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransferError::Io(err)),
            }
        }
    }

    /// Process a completed inbound pack.
    ///
    /// An ACK resolves its pending send and yields `None`. A data pack is
    /// acknowledged on the wire, recorded in the session's last-received
    /// marker, and handed back for the application. Unparsable headers fail
    /// with [`TransferError::Parsing`] and leave all markers untouched —
    /// connection-level fallout is the caller's decision.
    pub fn handle_complete(&mut self, pack: Pack) -> Result<Option<Pack>> {
        let header = self.parse_header(&pack)?;

        if header.is_ack() {
            let resolved = self.state()?.resolve_ack(header.id());
            if let Some(entry) = resolved {
                debug!(session = %self.session.key(), id = entry.id, seq = entry.seq, "send acknowledged");
                // Run the callback outside the session lock.
                if let Some(callback) = entry.into_callback() {
                    callback();
                }
            }
            return Ok(None);
        }

        self.writer.write_pack(&header.ack_reply())?;
        self.state()?.record_ack(Progress {
            id: header.id(),
            seq: header.seq(),
        });
        Ok(Some(pack))
    }

    /// Process an inbound pack whose header is decoded but whose body is
    /// still arriving.
    ///
    /// Records the mid-receive marker so a recovered session can identify
    /// which message a disconnect interrupted. ACK headers carry no body
    /// worth tracking and are ignored.
    pub fn handle_header(&mut self, pack: &Pack) -> Result<()> {
        let header = self.parse_header(pack)?;
        if header.is_ack() {
            return Ok(());
        }
        self.state()?.record_merging(Progress {
            id: header.id(),
            seq: header.seq(),
        });
        Ok(())
    }

    fn parse_header(&self, pack: &Pack) -> Result<TransferHeader> {
        TransferHeader::parse(pack).map_err(|err| {
            error!(session = %self.session.key(), "failed to parse transfer header: {err}");
            err.into()
        })
    }
}

impl<R, W: Write> std::fmt::Debug for Transfer<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("session", self.session.key())
            .field("epoch", &self.epoch)
            .finish()
    }
}
