use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PackError, Result};
use crate::pack::{Field, Pack};

/// Magic bytes: "SL" (0x53 0x4C).
pub const MAGIC: [u8; 2] = [0x53, 0x4C];

/// Maximum number of header fields per pack.
pub const MAX_HEADER_FIELDS: usize = 16;

/// Maximum length of a string header field in bytes.
pub const MAX_STR_FIELD: usize = 1024;

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

const TAG_UINT: u8 = 0x01;
const TAG_STR: u8 = 0x02;

/// Configuration for the pack codec.
#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Maximum body size in bytes. Default: 16 MiB.
    pub max_body_size: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
        }
    }
}

/// A fully decoded header region.
#[derive(Debug)]
pub struct DecodedHeader {
    /// The header fields, field 0 first.
    pub fields: Vec<Field>,
    /// Announced body length in bytes.
    pub body_len: usize,
    /// Number of bytes the header region occupies in the input.
    pub consumed: usize,
}

/// Encode a pack into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────┬──────────────────┬───────────┬──────────────┐
/// │ Magic (2B) │ Count   │ Fields           │ Body len  │ Body         │
/// │ 0x53 0x4C  │ (1B)    │ (tagged scalars) │ (4B LE)   │ (len bytes)  │
/// └────────────┴─────────┴──────────────────┴───────────┴──────────────┘
/// ```
/// Each field is a tag byte followed by its value: `0x01` + u64 LE for
/// integers, `0x02` + u16 LE length + UTF-8 bytes for strings.
pub fn encode_pack(pack: &Pack, dst: &mut BytesMut) -> Result<()> {
    let fields = pack.header();
    if fields.len() > MAX_HEADER_FIELDS {
        return Err(PackError::TooManyFields {
            count: fields.len(),
            max: MAX_HEADER_FIELDS,
        });
    }
    if pack.body().len() > u32::MAX as usize {
        return Err(PackError::BodyTooLarge {
            size: pack.body().len(),
            max: u32::MAX as usize,
        });
    }

    dst.reserve(header_wire_size(fields)? + 4 + pack.body().len());
    dst.put_slice(&MAGIC);
    dst.put_u8(fields.len() as u8);
    for field in fields {
        match field {
            Field::Uint(value) => {
                dst.put_u8(TAG_UINT);
                dst.put_u64_le(*value);
            }
            Field::Str(value) => {
                dst.put_u8(TAG_STR);
                dst.put_u16_le(value.len() as u16);
                dst.put_slice(value.as_bytes());
            }
        }
    }
    dst.put_u32_le(pack.body().len() as u32);
    dst.put_slice(pack.body());
    Ok(())
}

fn header_wire_size(fields: &[Field]) -> Result<usize> {
    let mut size = 3; // magic + count
    for field in fields {
        size += match field {
            Field::Uint(_) => 1 + 8,
            Field::Str(value) => {
                if value.len() > MAX_STR_FIELD {
                    return Err(PackError::FieldTooLong {
                        len: value.len(),
                        max: MAX_STR_FIELD,
                    });
                }
                1 + 2 + value.len()
            }
        };
    }
    Ok(size)
}

/// Decode the header region from the front of `src` without consuming it.
///
/// Returns `Ok(None)` if `src` doesn't yet contain the complete header
/// region. Malformed input (bad magic, unknown tag, oversized declarations)
/// is an error as soon as it becomes visible, even on partial input.
pub fn decode_header(src: &[u8], config: &PackConfig) -> Result<Option<DecodedHeader>> {
    if src.len() < 2 {
        return Ok(None);
    }
    if src[0..2] != MAGIC {
        return Err(PackError::InvalidMagic);
    }
    if src.len() < 3 {
        return Ok(None);
    }

    let count = src[2] as usize;
    if count > MAX_HEADER_FIELDS {
        return Err(PackError::TooManyFields {
            count,
            max: MAX_HEADER_FIELDS,
        });
    }

    let mut cursor = 3usize;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let Some(&tag) = src.get(cursor) else {
            return Ok(None);
        };
        cursor += 1;
        match tag {
            TAG_UINT => {
                let Some(raw) = src.get(cursor..cursor + 8) else {
                    return Ok(None);
                };
                // get() guarantees the 8-byte slice
                fields.push(Field::Uint(u64::from_le_bytes(raw.try_into().unwrap())));
                cursor += 8;
            }
            TAG_STR => {
                let Some(raw) = src.get(cursor..cursor + 2) else {
                    return Ok(None);
                };
                let len = u16::from_le_bytes(raw.try_into().unwrap()) as usize;
                if len > MAX_STR_FIELD {
                    return Err(PackError::FieldTooLong {
                        len,
                        max: MAX_STR_FIELD,
                    });
                }
                cursor += 2;
                let Some(raw) = src.get(cursor..cursor + len) else {
                    return Ok(None);
                };
                let value =
                    std::str::from_utf8(raw).map_err(|_| PackError::InvalidString)?;
                fields.push(Field::Str(value.to_string()));
                cursor += len;
            }
            other => return Err(PackError::UnknownFieldTag { tag: other }),
        }
    }

    let Some(raw) = src.get(cursor..cursor + 4) else {
        return Ok(None);
    };
    let body_len = u32::from_le_bytes(raw.try_into().unwrap()) as usize;
    if body_len > config.max_body_size {
        return Err(PackError::BodyTooLarge {
            size: body_len,
            max: config.max_body_size,
        });
    }
    cursor += 4;

    Ok(Some(DecodedHeader {
        fields,
        body_len,
        consumed: cursor,
    }))
}

/// Decode a whole pack from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete pack yet.
/// On success, consumes the pack bytes from the buffer.
pub fn decode_pack(src: &mut BytesMut, config: &PackConfig) -> Result<Option<Pack>> {
    let Some(header) = decode_header(&src[..], config)? else {
        return Ok(None);
    };
    if src.len() < header.consumed + header.body_len {
        return Ok(None);
    }

    src.advance(header.consumed);
    let body = src.split_to(header.body_len).freeze();
    Ok(Some(Pack::from_parts(header.fields, body)))
}
