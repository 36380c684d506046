//! Header field representations (RFC 7541 Section 6).
//!
//! Each field in a header block is one of: an indexed field, a literal
//! field in one of three indexing modes, or a dynamic table size update.
//! The representation is identified by the pattern bits of its first byte.

use crate::error::{HpackError, Result};
use crate::header_field::HeaderField;
use crate::header_table::HeaderTable;
use crate::integer;
use crate::string;
use bytes::{BufMut, BytesMut};

/// How a literal header field interacts with the dynamic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingMode {
    /// `01` pattern: the decoded field is inserted into the dynamic table.
    IncrementalIndexing,
    /// `0000` pattern: decoded without touching the table.
    WithoutIndexing,
    /// `0001` pattern: as WithoutIndexing, and intermediaries must not
    /// index it either.
    NeverIndexed,
}

impl IndexingMode {
    fn pattern(self) -> u8 {
        match self {
            IndexingMode::IncrementalIndexing => 0x40,
            IndexingMode::WithoutIndexing => 0x00,
            IndexingMode::NeverIndexed => 0x10,
        }
    }

    fn prefix_bits(self) -> u8 {
        match self {
            IndexingMode::IncrementalIndexing => 6,
            IndexingMode::WithoutIndexing | IndexingMode::NeverIndexed => 4,
        }
    }
}

/// Encode an indexed header field (Section 6.1).
pub fn encode_indexed_header_field(dst: &mut BytesMut, index: u32) {
    integer::encode_int(dst, index, 7, 0x80);
}

/// Encode a literal header field whose name is a table reference
/// (Section 6.2, name index non-zero).
pub fn encode_literal_header_field_indexed_name(
    dst: &mut BytesMut,
    name_index: u32,
    value: &[u8],
    mode: IndexingMode,
) {
    integer::encode_int(dst, name_index, mode.prefix_bits(), mode.pattern());
    string::encode_string(dst, value);
}

/// Encode a literal header field with the name spelled out inline
/// (Section 6.2, name index zero).
pub fn encode_literal_header_field(dst: &mut BytesMut, field: &HeaderField, mode: IndexingMode) {
    dst.put_u8(mode.pattern());
    string::encode_string(dst, &field.name);
    string::encode_string(dst, &field.value);
}

/// Decode an indexed header field (Section 6.1). Index 0 is a decoding
/// error.
pub fn decode_indexed_header_field(
    data: &[u8],
    table: &HeaderTable,
) -> Result<(HeaderField, usize)> {
    let (index, consumed) = integer::decode_int(data, 7)?;
    let field = table.get_from_indexing_tables(index)?;
    Ok((field, consumed))
}

/// Decode a literal header field in any of the three indexing modes
/// (Section 6.2). The caller has already ruled out the indexed and
/// size-update patterns.
///
/// On incremental indexing the decoded field is inserted into the dynamic
/// table after it is produced.
pub fn decode_literal_header_field(
    data: &[u8],
    table: &mut HeaderTable,
) -> Result<(HeaderField, usize)> {
    if data.is_empty() {
        return Err(HpackError::UnexpectedEof);
    }

    let (mode, prefix_bits) = if data[0] & 0x40 != 0 {
        (IndexingMode::IncrementalIndexing, 6)
    } else if data[0] & 0x10 != 0 {
        (IndexingMode::NeverIndexed, 4)
    } else {
        (IndexingMode::WithoutIndexing, 4)
    };

    let (name_index, mut pos) = integer::decode_int(data, prefix_bits)?;

    let name = if name_index != 0 {
        table.get_from_indexing_tables(name_index)?.name
    } else {
        let (name, consumed) = string::decode_string(&data[pos..])?;
        pos += consumed;
        name
    };

    let (value, consumed) = string::decode_string(&data[pos..])?;
    pos += consumed;

    let field = HeaderField { name, value };

    if mode == IndexingMode::IncrementalIndexing {
        table.add_header_field(field.clone());
    }

    Ok((field, pos))
}

/// Decode a dynamic table size update (Section 6.3) and apply it.
pub fn decode_table_size_update(data: &[u8], table: &mut HeaderTable) -> Result<usize> {
    let (new_size, consumed) = integer::decode_int(data, 5)?;
    table.set_max_size(new_size as usize);
    Ok(consumed)
}
