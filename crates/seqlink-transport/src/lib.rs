//! Byte-stream connection layer for seqlink.
//!
//! Provides a unified interface over the stream transports a seqlink peer
//! can run on:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! This is the lowest layer of seqlink. Everything else builds on top of
//! the [`LinkStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::LinkListener;
pub use stream::LinkStream;
