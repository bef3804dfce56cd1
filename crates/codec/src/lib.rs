//! # Codec - Compact Binary Value Encoding
//!
//! Serializes JSON values ([`serde_json::Value`]) into a tagged,
//! length-prefixed binary form. The store uses it for the tombstone index,
//! where keys are written back to back with no framing of their own.
//!
//! ## Binary Format
//!
//! Every value is a one-byte tag followed by its payload. All integers are
//! little-endian.
//!
//! ```text
//! [0]                          null
//! [1]                          false
//! [2]                          true
//! [3][i64]                     integer
//! [4][u64]                     integer above i64::MAX
//! [5][f64]                     float
//! [6][len: u32][utf8 bytes]    string
//! [7][count: u32][value]*      array
//! [8][count: u32][(len: u32, utf8 key bytes, value)]*   object
//! ```
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let mut buf = Vec::new();
//! codec::write_value(&mut buf, &json!("HSQLDB")).unwrap();
//! let back = codec::read_value(&mut &buf[..]).unwrap();
//! assert_eq!(back, json!("HSQLDB"));
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde_json::{Map, Number, Value};
use std::io::{self, Read, Write};

use thiserror::Error;

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_I64: u8 = 3;
const TAG_U64: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_ARRAY: u8 = 7;
const TAG_OBJECT: u8 = 8;

/// Upper bound on any length or count prefix (64 MiB). Larger prefixes are
/// treated as corruption rather than allocated.
pub const MAX_LEN: u32 = 64 * 1024 * 1024;

/// Maximum nesting depth of arrays and objects.
pub const MAX_DEPTH: usize = 128;

/// Errors that can occur while encoding or decoding values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An underlying I/O error. A truncated input surfaces as
    /// [`io::ErrorKind::UnexpectedEof`].
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The tag byte does not name a known type.
    #[error("unknown value tag {0}")]
    UnknownTag(u8),

    /// A length or count prefix exceeds [`MAX_LEN`].
    #[error("length prefix {0} exceeds limit")]
    TooLarge(u64),

    /// Arrays or objects nested deeper than [`MAX_DEPTH`].
    #[error("value nested too deeply")]
    TooDeep,

    /// A string payload is not valid UTF-8.
    #[error("string is not valid utf-8")]
    InvalidUtf8,

    /// A float payload is NaN or infinite, which JSON cannot represent.
    #[error("non-finite float {0}")]
    NonFinite(f64),
}

/// Appends the encoding of `value` to `w`.
pub fn write_value<W: Write>(w: &mut W, value: &Value) -> Result<(), CodecError> {
    write_nested(w, value, 0)
}

/// Decodes one value from `r`.
pub fn read_value<R: Read>(r: &mut R) -> Result<Value, CodecError> {
    read_nested(r, 0)
}

fn write_nested<W: Write>(w: &mut W, value: &Value, depth: usize) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep);
    }

    match value {
        Value::Null => w.write_u8(TAG_NULL)?,
        Value::Bool(false) => w.write_u8(TAG_FALSE)?,
        Value::Bool(true) => w.write_u8(TAG_TRUE)?,
        Value::Number(n) => write_number(w, n)?,
        Value::String(s) => {
            w.write_u8(TAG_STRING)?;
            write_str(w, s)?;
        }
        Value::Array(items) => {
            w.write_u8(TAG_ARRAY)?;
            write_len(w, items.len())?;
            for item in items {
                write_nested(w, item, depth + 1)?;
            }
        }
        Value::Object(fields) => {
            w.write_u8(TAG_OBJECT)?;
            write_len(w, fields.len())?;
            for (key, item) in fields {
                write_str(w, key)?;
                write_nested(w, item, depth + 1)?;
            }
        }
    }

    Ok(())
}

fn write_number<W: Write>(w: &mut W, n: &Number) -> Result<(), CodecError> {
    if let Some(i) = n.as_i64() {
        w.write_u8(TAG_I64)?;
        w.write_i64::<LittleEndian>(i)?;
    } else if let Some(u) = n.as_u64() {
        w.write_u8(TAG_U64)?;
        w.write_u64::<LittleEndian>(u)?;
    } else {
        // serde_json never stores a non-finite f64, so this always succeeds
        // when the value came from a parsed document.
        let f = n.as_f64().unwrap_or(f64::NAN);
        if !f.is_finite() {
            return Err(CodecError::NonFinite(f));
        }
        w.write_u8(TAG_F64)?;
        w.write_f64::<LittleEndian>(f)?;
    }
    Ok(())
}

fn write_len<W: Write>(w: &mut W, len: usize) -> Result<(), CodecError> {
    if len as u64 > MAX_LEN as u64 {
        return Err(CodecError::TooLarge(len as u64));
    }
    w.write_u32::<LittleEndian>(len as u32)?;
    Ok(())
}

fn write_str<W: Write>(w: &mut W, s: &str) -> Result<(), CodecError> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_nested<R: Read>(r: &mut R, depth: usize) -> Result<Value, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep);
    }

    let value = match r.read_u8()? {
        TAG_NULL => Value::Null,
        TAG_FALSE => Value::Bool(false),
        TAG_TRUE => Value::Bool(true),
        TAG_I64 => Value::from(r.read_i64::<LittleEndian>()?),
        TAG_U64 => Value::from(r.read_u64::<LittleEndian>()?),
        TAG_F64 => {
            let f = r.read_f64::<LittleEndian>()?;
            Value::Number(Number::from_f64(f).ok_or(CodecError::NonFinite(f))?)
        }
        TAG_STRING => Value::String(read_str(r)?),
        TAG_ARRAY => {
            let count = read_len(r)?;
            // Cap the up-front reservation; a corrupt count should fail on
            // EOF, not on allocation.
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(read_nested(r, depth + 1)?);
            }
            Value::Array(items)
        }
        TAG_OBJECT => {
            let count = read_len(r)?;
            let mut fields = Map::new();
            for _ in 0..count {
                let key = read_str(r)?;
                let item = read_nested(r, depth + 1)?;
                fields.insert(key, item);
            }
            Value::Object(fields)
        }
        other => return Err(CodecError::UnknownTag(other)),
    };

    Ok(value)
}

fn read_len<R: Read>(r: &mut R) -> Result<usize, CodecError> {
    let len = r.read_u32::<LittleEndian>()?;
    if len > MAX_LEN {
        return Err(CodecError::TooLarge(len as u64));
    }
    Ok(len as usize)
}

fn read_str<R: Read>(r: &mut R) -> Result<String, CodecError> {
    let len = read_len(r)?;
    let mut bytes = Vec::with_capacity(len.min(64 * 1024));
    r.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(CodecError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated string payload",
        )));
    }
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}

#[cfg(test)]
mod tests;
