//! Reserved-field header schemes.
//!
//! Handshake packs and transfer packs use distinct schemes and are never
//! mixed on one pack instance — a handshake fully resolves before transfer
//! wiring is installed. Field 0 is always the kind discriminator; reserved
//! fields come first so applications can append their own after them.

use seqlink_pack::{Field, Pack};

use crate::queue::{MsgId, Seq};
use crate::session::SessionKey;

/// Wire discriminators. The handshake and transfer value spaces are
/// disjoint so a pack of one scheme never parses as the other.
const KIND_REQUEST: u64 = 1;
const KIND_ESTABLISHED: u64 = 2;
const KIND_ERROR: u64 = 3;
const KIND_DATA: u64 = 16;
const KIND_ACK: u64 = 17;

/// Number of reserved header fields on a transfer pack (kind, id, seq).
/// Application fields start at this index.
pub const TRANSFER_RESERVED_FIELDS: usize = 3;

/// Errors raised when a pack's reserved header fields cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    /// A required header field is absent.
    #[error("missing header field {index}")]
    MissingField { index: usize },

    /// A header field holds the wrong scalar type.
    #[error("header field {index} has unexpected type")]
    FieldType { index: usize },

    /// Field 0 is not a recognized kind discriminator.
    #[error("unrecognized kind discriminator {value}")]
    UnknownKind { value: u64 },
}

/// Kind of a handshake pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Request,
    Established,
    Error,
}

/// Kind of a transfer pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Data,
    Ack,
}

fn kind_field(pack: &Pack) -> Result<u64, ParsingError> {
    match pack.field(0) {
        Some(Field::Uint(value)) => Ok(*value),
        Some(_) => Err(ParsingError::FieldType { index: 0 }),
        None => Err(ParsingError::MissingField { index: 0 }),
    }
}

/// Parsed view of a handshake pack's reserved fields.
#[derive(Debug)]
pub struct HandshakeHeader {
    kind: HandshakeKind,
    key: Option<SessionKey>,
}

impl HandshakeHeader {
    /// Read the reserved fields of an inbound handshake pack.
    pub fn parse(pack: &Pack) -> Result<Self, ParsingError> {
        let kind = match kind_field(pack)? {
            KIND_REQUEST => HandshakeKind::Request,
            KIND_ESTABLISHED => HandshakeKind::Established,
            KIND_ERROR => HandshakeKind::Error,
            value => return Err(ParsingError::UnknownKind { value }),
        };

        // Field 1 carries the recovery key, present only on a resuming REQUEST.
        let key = match (kind, pack.field(1)) {
            (HandshakeKind::Request, Some(Field::Str(key))) => Some(SessionKey::new(key.clone())),
            (HandshakeKind::Request, Some(_)) => {
                return Err(ParsingError::FieldType { index: 1 })
            }
            _ => None,
        };

        Ok(Self { kind, key })
    }

    pub fn kind(&self) -> HandshakeKind {
        self.kind
    }

    /// The recovery key carried by a REQUEST, if any.
    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// Build a REQUEST pack; `key` is carried in field 1 iff resuming.
    pub fn request(key: Option<&SessionKey>) -> Pack {
        let mut pack = Pack::new();
        pack.push_field(KIND_REQUEST);
        if let Some(key) = key {
            pack.push_field(key.as_str());
        }
        pack
    }

    /// Build an ESTABLISHED pack.
    pub fn established() -> Pack {
        let mut pack = Pack::new();
        pack.push_field(KIND_ESTABLISHED);
        pack
    }

    /// Build an ERROR pack.
    pub fn error() -> Pack {
        let mut pack = Pack::new();
        pack.push_field(KIND_ERROR);
        pack
    }
}

/// Parsed view of a transfer pack's reserved fields.
#[derive(Debug, Clone, Copy)]
pub struct TransferHeader {
    kind: TransferKind,
    id: MsgId,
    seq: Seq,
}

impl TransferHeader {
    /// Read the reserved fields of an inbound transfer pack.
    pub fn parse(pack: &Pack) -> Result<Self, ParsingError> {
        let kind = match kind_field(pack)? {
            KIND_DATA => TransferKind::Data,
            KIND_ACK => TransferKind::Ack,
            value => return Err(ParsingError::UnknownKind { value }),
        };
        let id = uint_field(pack, 1)?;
        let seq = uint_field(pack, 2)?;
        Ok(Self { kind, id, seq })
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// True iff this pack acknowledges an earlier send.
    pub fn is_ack(&self) -> bool {
        self.kind == TransferKind::Ack
    }

    pub fn id(&self) -> MsgId {
        self.id
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    /// Stamp kind=DATA plus id and seq onto an outbound pack.
    ///
    /// Overwrites the reserved fields in place; application fields at index
    /// [`TRANSFER_RESERVED_FIELDS`] and above are untouched.
    pub fn stamp_data(pack: &mut Pack, id: MsgId, seq: Seq) {
        pack.set_field(0, KIND_DATA);
        pack.set_field(1, id);
        pack.set_field(2, seq);
    }

    /// Derive the ACK pack echoing this header's id and seq. Carries no body.
    pub fn ack_reply(&self) -> Pack {
        let mut pack = Pack::new();
        pack.push_field(KIND_ACK);
        pack.push_field(self.id);
        pack.push_field(self.seq);
        pack
    }
}

fn uint_field(pack: &Pack, index: usize) -> Result<u64, ParsingError> {
    match pack.field(index) {
        Some(Field::Uint(value)) => Ok(*value),
        Some(_) => Err(ParsingError::FieldType { index }),
        None => Err(ParsingError::MissingField { index }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_key_roundtrips() {
        let key = SessionKey::new("k-123");
        let pack = HandshakeHeader::request(Some(&key));
        let header = HandshakeHeader::parse(&pack).unwrap();
        assert_eq!(header.kind(), HandshakeKind::Request);
        assert_eq!(header.key(), Some(&key));
    }

    #[test]
    fn request_without_key() {
        let pack = HandshakeHeader::request(None);
        let header = HandshakeHeader::parse(&pack).unwrap();
        assert_eq!(header.kind(), HandshakeKind::Request);
        assert!(header.key().is_none());
    }

    #[test]
    fn established_and_error_parse() {
        let header = HandshakeHeader::parse(&HandshakeHeader::established()).unwrap();
        assert_eq!(header.kind(), HandshakeKind::Established);

        let header = HandshakeHeader::parse(&HandshakeHeader::error()).unwrap();
        assert_eq!(header.kind(), HandshakeKind::Error);
    }

    #[test]
    fn request_with_wrong_key_type_rejected() {
        let mut pack = Pack::new();
        pack.push_field(KIND_REQUEST);
        pack.push_field(42u64);
        let err = HandshakeHeader::parse(&pack).unwrap_err();
        assert!(matches!(err, ParsingError::FieldType { index: 1 }));
    }

    #[test]
    fn handshake_rejects_transfer_kinds() {
        let mut pack = Pack::new();
        TransferHeader::stamp_data(&mut pack, 1, 1);
        let err = HandshakeHeader::parse(&pack).unwrap_err();
        assert!(matches!(err, ParsingError::UnknownKind { value: KIND_DATA }));
    }

    #[test]
    fn data_stamp_roundtrips() {
        let mut pack = Pack::with_body("payload");
        TransferHeader::stamp_data(&mut pack, 7, 13);
        let header = TransferHeader::parse(&pack).unwrap();
        assert_eq!(header.kind(), TransferKind::Data);
        assert!(!header.is_ack());
        assert_eq!(header.id(), 7);
        assert_eq!(header.seq(), 13);
    }

    #[test]
    fn stamp_preserves_application_fields() {
        let mut pack = Pack::new();
        pack.set_field(TRANSFER_RESERVED_FIELDS, "app-route");
        TransferHeader::stamp_data(&mut pack, 1, 2);
        assert_eq!(
            pack.field(TRANSFER_RESERVED_FIELDS).and_then(Field::as_str),
            Some("app-route")
        );
        assert!(TransferHeader::parse(&pack).is_ok());
    }

    #[test]
    fn ack_reply_echoes_id_and_seq() {
        let mut pack = Pack::with_body("payload");
        TransferHeader::stamp_data(&mut pack, 3, 9);
        let header = TransferHeader::parse(&pack).unwrap();

        let reply = header.ack_reply();
        assert!(reply.body().is_empty());
        let parsed = TransferHeader::parse(&reply).unwrap();
        assert!(parsed.is_ack());
        assert_eq!(parsed.id(), 3);
        assert_eq!(parsed.seq(), 9);
    }

    #[test]
    fn transfer_parse_requires_id_and_seq() {
        let mut pack = Pack::new();
        pack.push_field(KIND_ACK);
        let err = TransferHeader::parse(&pack).unwrap_err();
        assert!(matches!(err, ParsingError::MissingField { index: 1 }));

        let mut pack = Pack::new();
        pack.push_field(KIND_DATA);
        pack.push_field("not-an-id");
        let err = TransferHeader::parse(&pack).unwrap_err();
        assert!(matches!(err, ParsingError::FieldType { index: 1 }));
    }

    #[test]
    fn transfer_rejects_handshake_kinds() {
        let pack = HandshakeHeader::established();
        let err = TransferHeader::parse(&pack).unwrap_err();
        assert!(matches!(
            err,
            ParsingError::UnknownKind {
                value: KIND_ESTABLISHED
            }
        ));
    }

    #[test]
    fn empty_pack_is_missing_kind() {
        let err = TransferHeader::parse(&Pack::new()).unwrap_err();
        assert!(matches!(err, ParsingError::MissingField { index: 0 }));
    }
}
