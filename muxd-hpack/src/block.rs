//! Header block encoding and decoding.
//!
//! A header block is a concatenation of field representations evaluated in
//! order against the table shared by the connection. Any malformed field
//! fails the whole block; the caller must then tear down the HTTP/2
//! connection, because the table state is no longer synchronized.

use crate::error::{HpackError, Result};
use crate::header_field::HeaderField;
use crate::header_table::HeaderTable;
use crate::representation::{self, IndexingMode};
use bytes::{Bytes, BytesMut};

/// Encode a list of header fields into a block.
///
/// Every field is written as a literal with incremental indexing carrying
/// the name and value inline, and inserted into `table` so that the
/// encoder-side table tracks what the peer's decoder will build.
pub fn encode_header_block(headers: &[HeaderField], table: &mut HeaderTable) -> Bytes {
    let mut buf = BytesMut::with_capacity(
        headers
            .iter()
            .map(|f| f.name.len() + f.value.len() + 8)
            .sum(),
    );

    for field in headers {
        representation::encode_literal_header_field(
            &mut buf,
            field,
            IndexingMode::IncrementalIndexing,
        );
        table.add_header_field(field.clone());
    }

    buf.freeze()
}

/// Decode a header block, mutating `table` with every incremental-indexing
/// insertion and size update along the way.
///
/// Dynamic table size updates are only valid before the first field of the
/// block (RFC 7541 Section 4.2).
pub fn decode_header_block(data: &[u8], table: &mut HeaderTable) -> Result<Vec<HeaderField>> {
    let mut fields = Vec::new();
    let mut pos = 0;
    let mut at_block_start = true;

    while pos < data.len() {
        let first = data[pos];

        if first & 0x80 != 0 {
            // 1xxxxxxx: indexed header field
            let (field, consumed) =
                representation::decode_indexed_header_field(&data[pos..], table)?;
            fields.push(field);
            pos += consumed;
            at_block_start = false;
        } else if first & 0xE0 == 0x20 {
            // 001xxxxx: dynamic table size update
            if !at_block_start {
                return Err(HpackError::SizeUpdateNotAtBlockStart);
            }
            pos += representation::decode_table_size_update(&data[pos..], table)?;
        } else {
            // 01xxxxxx / 0001xxxx / 0000xxxx: literal forms
            let (field, consumed) =
                representation::decode_literal_header_field(&data[pos..], table)?;
            fields.push(field);
            pos += consumed;
            at_block_start = false;
        }
    }

    Ok(fields)
}
