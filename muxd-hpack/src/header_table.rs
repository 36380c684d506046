//! Combined static and dynamic indexing table.
//!
//! The index address space starts at 1 and covers the static table first,
//! then the dynamic table (RFC 7541 Section 2.3.3). Every insertion into
//! the dynamic table shifts the dynamic indices up by one, so an index is
//! only meaningful at the moment it is evaluated.

use crate::dynamic_table::DynamicTable;
use crate::error::{HpackError, Result};
use crate::header_field::HeaderField;
use crate::static_table::{self, STATIC_TABLE_LEN};
use bytes::Bytes;

/// Default dynamic table size bound (HTTP/2 SETTINGS_HEADER_TABLE_SIZE).
pub const DEFAULT_HEADER_TABLE_SIZE: usize = 4096;

/// Indexing table shared by the encoder and decoder of one direction of a
/// connection. The two directions of a connection carry independent tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTable {
    dynamic: DynamicTable,
}

impl HeaderTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            dynamic: DynamicTable::new(max_size),
        }
    }

    /// Resolve a combined-address-space index to a header field.
    ///
    /// Index 0 and indices strictly greater than the sum of both table
    /// lengths are decoding errors (RFC 7541 Section 2.3.3).
    pub fn get_from_indexing_tables(&self, index: u32) -> Result<HeaderField> {
        if index == 0 {
            return Err(HpackError::InvalidIndex(0));
        }

        if index <= STATIC_TABLE_LEN {
            let entry = static_table::get(index).ok_or(HpackError::InvalidIndex(index))?;
            return Ok(HeaderField::new(
                Bytes::from_static(entry.name.as_bytes()),
                Bytes::from_static(entry.value.as_bytes()),
            ));
        }

        let relative = (index - STATIC_TABLE_LEN - 1) as usize;
        self.dynamic
            .get(relative)
            .cloned()
            .ok_or(HpackError::InvalidIndex(index))
    }

    pub fn add_header_field(&mut self, field: HeaderField) {
        self.dynamic.add_header_field(field);
    }

    pub fn set_max_size(&mut self, new_size: usize) {
        self.dynamic.set_max_size(new_size);
    }

    pub fn dynamic(&self) -> &DynamicTable {
        &self.dynamic
    }
}

impl Default for HeaderTable {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_TABLE_SIZE)
    }
}
