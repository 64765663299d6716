//! Pack wire codec and incremental stream demultiplexer for seqlink.
//!
//! A pack is the protocol's message unit: an ordered list of scalar header
//! fields followed by an opaque body. On the wire every pack is framed with:
//! - A 2-byte magic number ("SL") for stream synchronization
//! - A 1-byte header field count and the tagged fields themselves
//! - A 4-byte little-endian body length
//!
//! The [`Unpacker`] reassembles whole packs from raw stream chunks and
//! reports a pack's header as soon as it is decodable, before the body has
//! fully arrived — the hook the peer layer uses to track partially received
//! messages across disconnects.

pub mod codec;
pub mod error;
pub mod pack;
pub mod unpacker;
pub mod writer;

pub use codec::{decode_header, decode_pack, encode_pack, DecodedHeader, PackConfig};
pub use codec::{DEFAULT_MAX_BODY, MAGIC, MAX_HEADER_FIELDS, MAX_STR_FIELD};
pub use error::{PackError, Result};
pub use pack::{Field, Pack};
pub use unpacker::{UnpackEvent, Unpacker};
pub use writer::PackWriter;
