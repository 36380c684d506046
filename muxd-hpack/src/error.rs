//! HPACK error types.
//!
//! Every decoding failure maps to HTTP/2 `COMPRESSION_ERROR`; the caller
//! must terminate the connection because table state is unrecoverable
//! after a failed block.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HpackError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HpackError {
    /// Header block or field ends mid-encoding.
    #[error("unexpected end of header block")]
    UnexpectedEof,

    /// Prefix integer exceeds the u32 value space or its octet bound.
    #[error("prefix integer overflow")]
    IntegerOverflow,

    /// Index 0 or an index beyond the sum of both table lengths.
    #[error("invalid header table index: {0}")]
    InvalidIndex(u32),

    /// String literal longer than the per-field ceiling.
    #[error("string literal of {0} octets exceeds field length limit")]
    StringTooLong(usize),

    /// Huffman-encoded string contains an invalid code.
    #[error("malformed huffman encoding")]
    HuffmanDecode,

    /// Dynamic table size update after the first field of a block.
    #[error("dynamic table size update not at block start")]
    SizeUpdateNotAtBlockStart,
}
