//! Resumable, acknowledgment-tracked message transfer over byte streams.
//!
//! seqlink moves discrete messages ("packs") between two peers over a
//! persistent stream connection, acknowledges every delivery, and lets a
//! disconnected peer resume an in-flight session — pending sends, id/seq
//! counters, and the marker of the message that was mid-receive all
//! survive the reconnect.
//!
//! # Crate Structure
//!
//! - [`transport`] — Byte-stream connections (Unix sockets, TCP)
//! - [`pack`] — Pack wire codec and incremental stream demultiplexer
//! - [`peer`] — Handshake, session store, and the transfer engine

/// Re-export transport types.
pub mod transport {
    pub use seqlink_transport::*;
}

/// Re-export pack types.
pub mod pack {
    pub use seqlink_pack::*;
}

/// Re-export peer types.
pub mod peer {
    pub use seqlink_peer::*;
}
