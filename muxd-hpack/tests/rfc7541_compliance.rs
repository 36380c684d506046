//! RFC 7541 compliance tests.
//!
//! Covers the integer, string, and header field representation examples
//! from RFC 7541 Appendix C, plus dynamic table bound invariants and
//! encoder/decoder table synchronization across full blocks.

use bytes::BytesMut;
use muxd_hpack::{
    decode_header_block, encode_header_block, integer, representation, string, HeaderField,
    HeaderTable, HpackError, IndexingMode,
};

#[test]
fn integer_representation_examples() {
    // RFC 7541 Appendix C.1: 10 and 1337 with a 5-bit prefix, 42 with 8.
    let cases: [(u32, u8, &[u8]); 3] = [
        (10, 5, &[0x0A]),
        (1337, 5, &[0x1F, 0x9A, 0x0A]),
        (42, 8, &[0x2A]),
    ];

    for (value, prefix, expected) in cases {
        let mut buf = BytesMut::new();
        integer::encode_int(&mut buf, value, prefix, 0);
        assert_eq!(&buf[..], expected, "encoding {} prefix {}", value, prefix);

        let (decoded, consumed) = integer::decode_int(expected, prefix).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, expected.len());
    }
}

#[test]
fn integer_roundtrip_across_prefixes() {
    for value in [0u32, 1, 30, 31, 255, 256, 1337, 65535, 1_000_000, u32::MAX] {
        for prefix in 1..=8 {
            let mut buf = BytesMut::new();
            integer::encode_int(&mut buf, value, prefix, 0);
            let (decoded, consumed) = integer::decode_int(&buf, prefix).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }
}

#[test]
fn string_representation_examples() {
    // Raw form: length 10, "custom-key".
    let (decoded, consumed) = string::decode_string(b"\x0Acustom-key").unwrap();
    assert_eq!(&decoded[..], b"custom-key");
    assert_eq!(consumed, 11);

    // Huffman form of the same string (Appendix C.6.1).
    let (decoded, consumed) =
        string::decode_string(b"\x88\x25\xa8\x49\xe9\x5b\xa9\x7d\x7f").unwrap();
    assert_eq!(&decoded[..], b"custom-key");
    assert_eq!(consumed, 9);
}

#[test]
fn indexed_field_static_table() {
    // Appendix C.2.4: 0x82 is :method GET.
    let table = HeaderTable::default();
    let (field, consumed) = representation::decode_indexed_header_field(&[0x82], &table).unwrap();
    assert_eq!(&field.name[..], b":method");
    assert_eq!(&field.value[..], b"GET");
    assert_eq!(consumed, 1);
}

#[test]
fn literal_with_incremental_indexing() {
    // Appendix C.2.1: custom-key: custom-header.
    let mut table = HeaderTable::default();
    let data = b"\x40\x0Acustom-key\x0Dcustom-header";

    let decoded = decode_header_block(data, &mut table).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(&decoded[0].name[..], b"custom-key");
    assert_eq!(&decoded[0].value[..], b"custom-header");

    assert_eq!(table.dynamic().len(), 1);
    assert_eq!(table.dynamic().current_size(), 10 + 13 + 32);
}

#[test]
fn literal_representation_vectors() {
    // Appendix C.2 inline-name and indexed-name forms in all three modes.
    let field: HeaderField = ("password", "secret").into();
    let cases: [(IndexingMode, &[u8]); 3] = [
        (IndexingMode::IncrementalIndexing, b"\x40\x08password\x06secret"),
        (IndexingMode::WithoutIndexing, b"\x00\x08password\x06secret"),
        (IndexingMode::NeverIndexed, b"\x10\x08password\x06secret"),
    ];

    for (mode, expected) in cases {
        let mut buf = BytesMut::new();
        representation::encode_literal_header_field(&mut buf, &field, mode);
        assert_eq!(&buf[..], expected);

        let mut table = HeaderTable::default();
        let decoded = decode_header_block(expected, &mut table).unwrap();
        assert_eq!(decoded[0], field);

        let expected_entries = match mode {
            IndexingMode::IncrementalIndexing => 1,
            _ => 0,
        };
        assert_eq!(table.dynamic().len(), expected_entries);
    }
}

#[test]
fn first_request_block_roundtrip() {
    // Appendix C.3.1 headers; this encoder writes each as a literal with
    // incremental indexing, name and value inline, producing 64 bytes.
    let headers: Vec<HeaderField> = vec![
        (":method", "GET").into(),
        (":scheme", "http").into(),
        (":path", "/").into(),
        (":authority", "www.example.com").into(),
    ];

    let mut encoder_table = HeaderTable::default();
    let encoded = encode_header_block(&headers, &mut encoder_table);

    assert_eq!(encoded.len(), 64);
    assert_eq!(&encoded[..14], b"\x40\x07:method\x03GET\x40");

    let mut decoder_table = HeaderTable::default();
    let decoded = decode_header_block(&encoded, &mut decoder_table).unwrap();

    assert_eq!(decoded, headers);
    assert_eq!(encoder_table, decoder_table);
}

#[test]
fn tables_stay_synchronized_across_blocks() {
    let mut encoder_table = HeaderTable::default();
    let mut decoder_table = HeaderTable::default();

    for i in 0..10 {
        let headers: Vec<HeaderField> = vec![
            HeaderField::new(format!("x-request-{}", i).into_bytes(), &b"yes"[..]),
            (":method", "GET").into(),
        ];

        let encoded = encode_header_block(&headers, &mut encoder_table);
        let decoded = decode_header_block(&encoded, &mut decoder_table).unwrap();

        assert_eq!(decoded, headers);
        assert_eq!(encoder_table, decoder_table);
    }
}

#[test]
fn dynamic_table_bound_holds_for_any_insert_sequence() {
    let mut table = HeaderTable::new(256);

    for i in 0..100 {
        let name = format!("header-{}", i);
        let value = "v".repeat(i % 40);
        table.add_header_field(HeaderField::new(name.into_bytes(), value.into_bytes()));
        assert!(table.dynamic().current_size() <= table.dynamic().max_size());
    }
}

#[test]
fn oversized_entry_empties_table() {
    let mut table = HeaderTable::new(64);
    table.add_header_field(("a", "b").into());
    assert_eq!(table.dynamic().len(), 1);

    let big_value = "v".repeat(100);
    table.add_header_field(HeaderField::new(&b"big"[..], big_value.into_bytes()));
    assert!(table.dynamic().is_empty());
    assert_eq!(table.dynamic().current_size(), 0);
}

#[test]
fn size_update_to_zero_empties_table() {
    let mut table = HeaderTable::default();
    table.add_header_field(("a", "b").into());
    table.add_header_field(("c", "d").into());

    table.set_max_size(0);
    assert!(table.dynamic().is_empty());
}

#[test]
fn decoding_error_kinds() {
    // Truncated literal fails the block.
    let mut table = HeaderTable::default();
    assert_eq!(
        decode_header_block(b"\x40\x0Acustom-key", &mut table),
        Err(HpackError::UnexpectedEof)
    );

    // Index beyond both tables fails the block.
    let mut table = HeaderTable::default();
    assert!(matches!(
        decode_header_block(&[0xFF, 0x80, 0x7F], &mut table),
        Err(HpackError::InvalidIndex(_))
    ));

    // Integer overflow fails the block.
    let mut table = HeaderTable::default();
    assert_eq!(
        decode_header_block(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F], &mut table),
        Err(HpackError::IntegerOverflow)
    );

    // Size update after a field fails the block.
    let mut table = HeaderTable::default();
    assert_eq!(
        decode_header_block(&[0x82, 0x3F, 0x00], &mut table),
        Err(HpackError::SizeUpdateNotAtBlockStart)
    );
}
