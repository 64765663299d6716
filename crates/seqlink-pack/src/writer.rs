use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_pack, PackConfig};
use crate::error::{PackError, Result};
use crate::pack::Pack;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete packs to any `Write` stream.
pub struct PackWriter<T> {
    inner: T,
    buf: BytesMut,
    config: PackConfig,
}

impl<T: Write> PackWriter<T> {
    /// Create a new pack writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, PackConfig::default())
    }

    /// Create a new pack writer with explicit configuration.
    pub fn with_config(inner: T, config: PackConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a complete pack (blocking).
    pub fn write_pack(&mut self, pack: &Pack) -> Result<()> {
        if pack.body().len() > self.config.max_body_size {
            return Err(PackError::BodyTooLarge {
                size: pack.body().len(),
                max: self.config.max_body_size,
            });
        }

        self.buf.clear();
        encode_pack(pack, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(PackError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(PackError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(PackError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &PackConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_pack;
    use crate::pack::Field;

    fn decode_all(wire: Vec<u8>) -> Vec<Pack> {
        let mut buf = BytesMut::from(wire.as_slice());
        let cfg = PackConfig::default();
        let mut packs = Vec::new();
        while let Some(pack) = decode_pack(&mut buf, &cfg).unwrap() {
            packs.push(pack);
        }
        assert!(buf.is_empty());
        packs
    }

    #[test]
    fn write_single_pack() {
        let mut writer = PackWriter::new(Cursor::new(Vec::<u8>::new()));
        let mut pack = Pack::with_body("hello");
        pack.push_field(1u64);

        writer.write_pack(&pack).unwrap();

        let packs = decode_all(writer.into_inner().into_inner());
        assert_eq!(packs, vec![pack]);
    }

    #[test]
    fn write_multiple_packs() {
        let mut writer = PackWriter::new(Cursor::new(Vec::<u8>::new()));
        let packs: Vec<Pack> = (0..3u64)
            .map(|i| {
                let mut pack = Pack::with_body(format!("pack-{i}"));
                pack.push_field(i);
                pack
            })
            .collect();

        for pack in &packs {
            writer.write_pack(pack).unwrap();
        }

        assert_eq!(decode_all(writer.into_inner().into_inner()), packs);
    }

    #[test]
    fn body_too_large_rejected() {
        let cfg = PackConfig { max_body_size: 4 };
        let mut writer = PackWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        let err = writer.write_pack(&Pack::with_body("oversized")).unwrap_err();
        assert!(matches!(err, PackError::BodyTooLarge { .. }));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        struct ZeroWriter;
        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = PackWriter::new(ZeroWriter);
        let err = writer.write_pack(&Pack::with_body("x")).unwrap_err();
        assert!(matches!(err, PackError::ConnectionClosed));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        struct InterruptedThenOk {
            wrote_once: bool,
            flush_interrupted: bool,
            data: Vec<u8>,
        }
        impl Write for InterruptedThenOk {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if !self.wrote_once {
                    self.wrote_once = true;
                    return Err(std::io::Error::from(ErrorKind::Interrupted));
                }
                self.data.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                if !self.flush_interrupted {
                    self.flush_interrupted = true;
                    return Err(std::io::Error::from(ErrorKind::Interrupted));
                }
                Ok(())
            }
        }

        let mut writer = PackWriter::new(InterruptedThenOk {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        });
        writer.write_pack(&Pack::with_body("retry")).unwrap();
        assert!(!writer.into_inner().data.is_empty());
    }

    #[test]
    fn partial_writes_complete_the_pack() {
        struct OneBytePerCall(Vec<u8>);
        impl Write for OneBytePerCall {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if buf.is_empty() {
                    return Ok(0);
                }
                self.0.push(buf[0]);
                Ok(1)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = PackWriter::new(OneBytePerCall(Vec::new()));
        let mut pack = Pack::with_body("slow");
        pack.push_field(Field::Str("k".into()));
        writer.write_pack(&pack).unwrap();

        assert_eq!(decode_all(writer.into_inner().0), vec![pack]);
    }

    #[test]
    fn written_bytes_feed_an_unpacker() {
        let mut writer = PackWriter::new(Cursor::new(Vec::<u8>::new()));
        let mut pack = Pack::with_body("z");
        pack.push_field(9u64);
        writer.write_pack(&pack).unwrap();

        let mut unpacker = crate::unpacker::Unpacker::new();
        unpacker.feed(&writer.into_inner().into_inner());
        let mut last = None;
        while let Some(event) = unpacker.poll().unwrap() {
            last = Some(event);
        }
        assert_eq!(last, Some(crate::unpacker::UnpackEvent::Complete(pack)));
    }
}
