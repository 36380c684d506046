//! HPACK: Header Compression for HTTP/2 (RFC 7541)
//!
//! This crate implements the HPACK codec used by the HTTP/2 layer: a
//! shared 61-entry static table, a size-bounded dynamic table with
//! FIFO eviction, prefix-coded integers, optionally Huffman-coded string
//! literals, and the five header field representations.
//!
//! Encoder and decoder for one direction of a connection share a single
//! [`HeaderTable`]; the two directions carry independent tables. All codec
//! state is single-threaded per connection.
//!
//! # Example
//!
//! ```rust
//! use muxd_hpack::{decode_header_block, encode_header_block, HeaderField, HeaderTable};
//!
//! let headers: Vec<HeaderField> = vec![
//!     (":method", "GET").into(),
//!     (":path", "/").into(),
//! ];
//!
//! let mut encoder_table = HeaderTable::default();
//! let mut decoder_table = HeaderTable::default();
//!
//! let block = encode_header_block(&headers, &mut encoder_table);
//! let decoded = decode_header_block(&block, &mut decoder_table).unwrap();
//! assert_eq!(decoded, headers);
//! ```
//!
//! Any block-level decoding error is unrecoverable: the caller must close
//! the HTTP/2 connection with `COMPRESSION_ERROR`, since the peer's table
//! can no longer be tracked.

pub mod block;
pub mod dynamic_table;
pub mod error;
pub mod header_field;
pub mod header_table;
pub mod huffman;
pub mod integer;
pub mod representation;
pub mod static_table;
pub mod string;

pub use block::{decode_header_block, encode_header_block};
pub use dynamic_table::DynamicTable;
pub use error::{HpackError, Result};
pub use header_field::{HeaderField, ENTRY_OVERHEAD};
pub use header_table::{HeaderTable, DEFAULT_HEADER_TABLE_SIZE};
pub use representation::IndexingMode;
