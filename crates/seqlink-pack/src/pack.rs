use bytes::Bytes;

/// A scalar header field.
///
/// Field 0 of every pack is the kind discriminator; the reserved fields of
/// a scheme come first and application-defined fields follow them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Unsigned integer field.
    Uint(u64),
    /// UTF-8 string field.
    Str(String),
}

impl Field {
    /// The integer value, if this is a [`Field::Uint`].
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Field::Uint(value) => Some(*value),
            Field::Str(_) => None,
        }
    }

    /// The string value, if this is a [`Field::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Str(value) => Some(value),
            Field::Uint(_) => None,
        }
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        Field::Uint(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Str(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Str(value)
    }
}

/// A message unit: ordered scalar header fields plus an opaque body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pack {
    header: Vec<Field>,
    body: Bytes,
}

impl Pack {
    /// Create an empty pack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pack carrying only a body.
    pub fn with_body(body: impl Into<Bytes>) -> Self {
        Self {
            header: Vec::new(),
            body: body.into(),
        }
    }

    /// Assemble a pack from decoded parts.
    pub fn from_parts(header: Vec<Field>, body: Bytes) -> Self {
        Self { header, body }
    }

    /// The ordered header fields.
    pub fn header(&self) -> &[Field] {
        &self.header
    }

    /// The header field at `index`, if present.
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.header.get(index)
    }

    /// Set the header field at `index`, growing the header if needed.
    ///
    /// Gaps below `index` are padded with `Uint(0)` so reserved fields can
    /// be stamped after application fields were placed at higher indices,
    /// and vice versa.
    pub fn set_field(&mut self, index: usize, field: impl Into<Field>) {
        if index >= self.header.len() {
            self.header.resize(index + 1, Field::Uint(0));
        }
        self.header[index] = field.into();
    }

    /// Append a header field.
    pub fn push_field(&mut self, field: impl Into<Field>) {
        self.header.push(field.into());
    }

    /// The opaque body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Consume the pack and return its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_field_pads_gaps() {
        let mut pack = Pack::new();
        pack.set_field(2, 7u64);
        assert_eq!(pack.header().len(), 3);
        assert_eq!(pack.field(0), Some(&Field::Uint(0)));
        assert_eq!(pack.field(1), Some(&Field::Uint(0)));
        assert_eq!(pack.field(2), Some(&Field::Uint(7)));
    }

    #[test]
    fn set_field_overwrites_in_place() {
        let mut pack = Pack::new();
        pack.push_field("alpha");
        pack.set_field(0, 9u64);
        assert_eq!(pack.field(0), Some(&Field::Uint(9)));
        assert_eq!(pack.header().len(), 1);
    }

    #[test]
    fn field_accessors() {
        assert_eq!(Field::Uint(3).as_uint(), Some(3));
        assert_eq!(Field::Uint(3).as_str(), None);
        assert_eq!(Field::Str("k".into()).as_str(), Some("k"));
        assert_eq!(Field::Str("k".into()).as_uint(), None);
    }

    #[test]
    fn body_roundtrip() {
        let mut pack = Pack::with_body("payload");
        assert_eq!(pack.body().as_ref(), b"payload");
        pack.set_body(Bytes::from_static(b"other"));
        assert_eq!(pack.into_body().as_ref(), b"other");
    }
}
