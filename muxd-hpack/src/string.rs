//! String literal encoding and decoding per RFC 7541 Section 5.2.
//!
//! A string literal is a Huffman flag bit, a 7-bit-prefix length, and that
//! many octets of raw or Huffman-encoded data.

use crate::error::{HpackError, Result};
use crate::huffman;
use crate::integer;
use bytes::{BufMut, Bytes, BytesMut};

/// Longest accepted string literal. The protocol allows more; this ceiling
/// bounds allocation for a single decoded field.
pub const STRING_LENGTH_LIMIT: usize = 4096;

/// Decode a string literal from the head of `data`.
///
/// Returns the decoded octets and the number of input bytes consumed. An
/// input that ends exactly at the end of the string is valid.
pub fn decode_string(data: &[u8]) -> Result<(Bytes, usize)> {
    if data.is_empty() {
        return Err(HpackError::UnexpectedEof);
    }

    let huffman_encoded = data[0] & 0x80 != 0;
    let (encoded_len, consumed) = integer::decode_int(data, 7)?;
    let encoded_len = encoded_len as usize;

    if encoded_len > STRING_LENGTH_LIMIT {
        return Err(HpackError::StringTooLong(encoded_len));
    }

    let end = consumed + encoded_len;
    if end > data.len() {
        return Err(HpackError::UnexpectedEof);
    }

    let raw = &data[consumed..end];
    let decoded = if huffman_encoded {
        Bytes::from(huffman::decode(raw)?)
    } else {
        Bytes::copy_from_slice(raw)
    };

    Ok((decoded, end))
}

/// Append a string literal to `dst`.
///
/// The Huffman bit stays clear; this encoder always writes raw octets.
pub fn encode_string(dst: &mut BytesMut, value: &[u8]) {
    integer::encode_int(dst, value.len() as u32, 7, 0x00);
    dst.put_slice(value);
}
