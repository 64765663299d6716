use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{decode_header, PackConfig};
use crate::error::Result;
use crate::pack::{Field, Pack};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Events produced while reassembling packs from a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackEvent {
    /// A pack's header is fully decodable; its body is still arriving.
    /// The carried pack has the final header fields and an empty body.
    /// Emitted exactly once per pack, always before [`UnpackEvent::Complete`].
    Header(Pack),
    /// A whole pack (header and body) has been reassembled.
    Complete(Pack),
}

enum DecodeState {
    AwaitHeader,
    AwaitBody { fields: Vec<Field>, body_len: usize },
}

/// Incremental stream demultiplexer.
///
/// Fed raw connection chunks via [`Unpacker::feed`]; [`Unpacker::poll`]
/// yields at most one event per call, so callers control how far decoding
/// runs ahead of them. An `Unpacker` must not be shared across sessions —
/// its buffer holds the partially received pack that a resumed session
/// continues from.
pub struct Unpacker {
    buf: BytesMut,
    state: DecodeState,
    config: PackConfig,
}

impl Unpacker {
    /// Create an unpacker with default configuration.
    pub fn new() -> Self {
        Self::with_config(PackConfig::default())
    }

    /// Create an unpacker with explicit configuration.
    pub fn with_config(config: PackConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: DecodeState::AwaitHeader,
            config,
        }
    }

    /// Append raw stream bytes to the decode buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next event, if the buffer holds enough bytes.
    ///
    /// Returns `Ok(None)` when more input is needed. Decode errors leave the
    /// buffer untouched; the stream is unrecoverable past a framing error
    /// and the caller decides the connection-level fallout.
    pub fn poll(&mut self) -> Result<Option<UnpackEvent>> {
        match &mut self.state {
            DecodeState::AwaitHeader => {
                let Some(header) = decode_header(&self.buf[..], &self.config)? else {
                    return Ok(None);
                };
                self.buf.advance(header.consumed);
                let announced = Pack::from_parts(header.fields.clone(), Bytes::new());
                self.state = DecodeState::AwaitBody {
                    fields: header.fields,
                    body_len: header.body_len,
                };
                Ok(Some(UnpackEvent::Header(announced)))
            }
            DecodeState::AwaitBody { fields, body_len } => {
                let body_len = *body_len;
                if self.buf.len() < body_len {
                    return Ok(None);
                }
                let fields = std::mem::take(fields);
                self.state = DecodeState::AwaitHeader;
                let body = self.buf.split_to(body_len).freeze();
                Ok(Some(UnpackEvent::Complete(Pack::from_parts(fields, body))))
            }
        }
    }

    /// True when the decoder sits at a pack boundary.
    pub fn at_boundary(&self) -> bool {
        matches!(self.state, DecodeState::AwaitHeader)
    }

    /// Drain the raw bytes not yet consumed by the decoder.
    ///
    /// Only valid at a pack boundary (after a `Complete` event or before any
    /// input); used to hand leftover handshake bytes to a session's own
    /// unpacker.
    pub fn take_buffered(&mut self) -> Bytes {
        debug_assert!(self.at_boundary(), "take_buffered mid-pack loses state");
        self.buf.split().freeze()
    }

    /// Decoder configuration.
    pub fn config(&self) -> &PackConfig {
        &self.config
    }
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Unpacker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            DecodeState::AwaitHeader => "await-header",
            DecodeState::AwaitBody { .. } => "await-body",
        };
        f.debug_struct("Unpacker")
            .field("state", &state)
            .field("buffered", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_pack;
    use crate::error::PackError;

    fn wire_for(pack: &Pack) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_pack(pack, &mut buf).unwrap();
        buf
    }

    fn data_pack(tag: u64, body: &'static str) -> Pack {
        let mut pack = Pack::with_body(body);
        pack.push_field(tag);
        pack
    }

    #[test]
    fn header_then_complete_for_one_pack() {
        let pack = data_pack(7, "body-bytes");
        let wire = wire_for(&pack);

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);

        let header = unpacker.poll().unwrap().unwrap();
        let UnpackEvent::Header(announced) = header else {
            panic!("expected header event");
        };
        assert_eq!(announced.header(), pack.header());
        assert!(announced.body().is_empty());

        let complete = unpacker.poll().unwrap().unwrap();
        assert_eq!(complete, UnpackEvent::Complete(pack));
        assert!(unpacker.poll().unwrap().is_none());
    }

    #[test]
    fn header_fires_before_body_arrives() {
        let pack = data_pack(1, "late-body");
        let wire = wire_for(&pack);
        let header_len = wire.len() - pack.body().len();

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire[..header_len]);

        assert!(matches!(
            unpacker.poll().unwrap(),
            Some(UnpackEvent::Header(_))
        ));
        assert!(unpacker.poll().unwrap().is_none());
        assert!(!unpacker.at_boundary());

        unpacker.feed(&wire[header_len..]);
        assert!(matches!(
            unpacker.poll().unwrap(),
            Some(UnpackEvent::Complete(_))
        ));
        assert!(unpacker.at_boundary());
    }

    #[test]
    fn byte_by_byte_feeding() {
        let pack = data_pack(3, "dribble");
        let wire = wire_for(&pack);

        let mut unpacker = Unpacker::new();
        let mut events = Vec::new();
        for byte in wire.iter() {
            unpacker.feed(&[*byte]);
            while let Some(event) = unpacker.poll().unwrap() {
                events.push(event);
            }
        }

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], UnpackEvent::Header(_)));
        assert_eq!(events[1], UnpackEvent::Complete(pack));
    }

    #[test]
    fn multiple_packs_in_one_feed() {
        let first = data_pack(1, "one");
        let second = data_pack(2, "two");
        let mut wire = wire_for(&first);
        wire.extend_from_slice(&wire_for(&second));

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);

        let mut completes = Vec::new();
        while let Some(event) = unpacker.poll().unwrap() {
            if let UnpackEvent::Complete(pack) = event {
                completes.push(pack);
            }
        }
        assert_eq!(completes, vec![first, second]);
    }

    #[test]
    fn poll_stops_at_requested_granularity() {
        // Two packs buffered; caller polls one event and takes the rest raw.
        let first = data_pack(1, "one");
        let second = data_pack(2, "two");
        let second_wire = wire_for(&second);
        let mut wire = wire_for(&first);
        wire.extend_from_slice(&second_wire);

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);

        assert!(matches!(
            unpacker.poll().unwrap(),
            Some(UnpackEvent::Header(_))
        ));
        assert!(matches!(
            unpacker.poll().unwrap(),
            Some(UnpackEvent::Complete(_))
        ));

        let residual = unpacker.take_buffered();
        assert_eq!(residual.as_ref(), second_wire.as_ref());
    }

    #[test]
    fn decode_error_surfaces_from_poll() {
        let mut unpacker = Unpacker::new();
        unpacker.feed(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(unpacker.poll(), Err(PackError::InvalidMagic)));
    }

    #[test]
    fn empty_body_pack_emits_both_events() {
        let mut pack = Pack::new();
        pack.push_field(5u64);
        let wire = wire_for(&pack);

        let mut unpacker = Unpacker::new();
        unpacker.feed(&wire);
        assert!(matches!(
            unpacker.poll().unwrap(),
            Some(UnpackEvent::Header(_))
        ));
        assert_eq!(unpacker.poll().unwrap(), Some(UnpackEvent::Complete(pack)));
    }
}
