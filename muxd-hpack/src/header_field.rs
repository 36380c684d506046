//! Header field representation.
//!
//! HPACK treats names and values as opaque octet sequences: nothing here
//! assumes ASCII or validates header syntax, which belongs to the HTTP
//! layer above. Storage is `Bytes` so a field decoded out of a block and a
//! dynamic table entry can share one allocation, and evicting the entry
//! never invalidates a field already handed to the caller.

use bytes::Bytes;
use std::fmt;

/// Octets charged per entry by dynamic table accounting, on top of the
/// name and value lengths (RFC 7541 Section 4.1).
pub const ENTRY_OVERHEAD: usize = 32;

/// One header field: a name-value pair of opaque octets.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Octets this field occupies in a dynamic table.
    pub fn size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

impl<N: Into<Bytes>, V: Into<Bytes>> From<(N, V)> for HeaderField {
    fn from((name, value): (N, V)) -> Self {
        Self::new(name, value)
    }
}

impl fmt::Debug for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Octets, not text; render lossily for logs and assertions only.
        write!(
            f,
            "{}: {}",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}
