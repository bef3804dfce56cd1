use super::*;
use anyhow::Result;
use serde_json::json;

// -------------------- Helpers --------------------

fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, value).unwrap();
    buf
}

fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    read_value(&mut &bytes[..])
}

// -------------------- Layout --------------------

#[test]
fn string_layout_is_tag_len_bytes() {
    let buf = encode(&json!("ab"));
    assert_eq!(buf, vec![TAG_STRING, 2, 0, 0, 0, b'a', b'b']);
}

#[test]
fn scalars_are_single_tag_bytes() {
    assert_eq!(encode(&Value::Null), vec![TAG_NULL]);
    assert_eq!(encode(&json!(false)), vec![TAG_FALSE]);
    assert_eq!(encode(&json!(true)), vec![TAG_TRUE]);
}

#[test]
fn integer_picks_signed_tag_when_it_fits() {
    assert_eq!(encode(&json!(-7))[0], TAG_I64);
    assert_eq!(encode(&json!(7))[0], TAG_I64);
    assert_eq!(encode(&json!(u64::MAX))[0], TAG_U64);
    assert_eq!(encode(&json!(1.5))[0], TAG_F64);
}

// -------------------- Decoding --------------------

#[test]
fn consecutive_values_share_a_stream() -> Result<()> {
    // This is how the tombstone index is laid out: a count then the keys.
    let mut buf = Vec::new();
    write_value(&mut buf, &json!(2))?;
    write_value(&mut buf, &json!("Derby Network Client"))?;
    write_value(&mut buf, &json!(42))?;

    let mut r = &buf[..];
    assert_eq!(read_value(&mut r)?, json!(2));
    assert_eq!(read_value(&mut r)?, json!("Derby Network Client"));
    assert_eq!(read_value(&mut r)?, json!(42));
    assert!(r.is_empty());
    Ok(())
}

#[test]
fn nested_record_survives() -> Result<()> {
    let value = json!({
        "name": "Oracle Thin Driver",
        "port": 1521,
        "ratio": 0.25,
        "enabled": true,
        "aliases": ["oracle", null, {"deep": [1, 2, u64::MAX]}]
    });
    assert_eq!(decode(&encode(&value))?, value);
    Ok(())
}

#[test]
fn object_field_order_is_preserved() -> Result<()> {
    let value = json!({"z": 1, "a": 2, "m": 3});
    let back = decode(&encode(&value))?;
    let keys: Vec<&String> = back.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "a", "m"]);
    Ok(())
}

#[test]
fn unknown_tag_is_rejected() {
    assert!(matches!(decode(&[0x42]), Err(CodecError::UnknownTag(0x42))));
}

#[test]
fn empty_input_is_unexpected_eof() {
    match decode(&[]) {
        Err(CodecError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
        other => panic!("expected eof, got {:?}", other),
    }
}

#[test]
fn truncated_string_is_unexpected_eof() {
    let mut buf = encode(&json!("truncate me"));
    buf.truncate(buf.len() - 3);
    match decode(&buf) {
        Err(CodecError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
        other => panic!("expected eof, got {:?}", other),
    }
}

#[test]
fn oversized_length_prefix_is_rejected() {
    let mut buf = vec![TAG_STRING];
    buf.extend_from_slice(&(MAX_LEN + 1).to_le_bytes());
    assert!(matches!(decode(&buf), Err(CodecError::TooLarge(_))));
}

#[test]
fn invalid_utf8_is_rejected() {
    let buf = vec![TAG_STRING, 2, 0, 0, 0, 0xff, 0xfe];
    assert!(matches!(decode(&buf), Err(CodecError::InvalidUtf8)));
}

#[test]
fn nan_payload_is_rejected() {
    let mut buf = vec![TAG_F64];
    buf.extend_from_slice(&f64::NAN.to_le_bytes());
    assert!(matches!(decode(&buf), Err(CodecError::NonFinite(_))));
}

#[test]
fn excessive_nesting_is_rejected() {
    let mut value = json!("leaf");
    for _ in 0..(MAX_DEPTH + 2) {
        value = Value::Array(vec![value]);
    }

    let mut buf = Vec::new();
    assert!(matches!(
        write_value(&mut buf, &value),
        Err(CodecError::TooDeep)
    ));

    // A hand-built stream of nested array headers is refused on read too.
    let mut buf = Vec::new();
    for _ in 0..(MAX_DEPTH + 2) {
        buf.push(TAG_ARRAY);
        buf.extend_from_slice(&1u32.to_le_bytes());
    }
    buf.push(TAG_NULL);
    assert!(matches!(decode(&buf), Err(CodecError::TooDeep)));
}
