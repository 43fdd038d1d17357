//! Order-preserving encoding of values and keys.
//!
//! Encoded values compare, byte by byte, in the same order as the values
//! they encode. Keys are built by prefixing the encoded primary-key columns
//! with the table's prefix, so each table occupies one contiguous key range.
//!
//! # Format
//!
//! ```text
//! INT64   8 bytes big-endian of (v as u64) ^ (1 << 63)
//! BYTES   escaped bytes, then 0x00
//!           0x00 -> 0x01 0x01
//!           0x01 -> 0x01 0x02
//! key     prefix (4 bytes big-endian) || values
//! ```
//!
//! Flipping the sign bit maps negative integers below non-negative ones.
//! Escaping leaves the terminator as the only 0x00 in an encoded string.

use std::borrow::Cow;

use bytes::{Buf, BufMut};
use strata_common::constants::TABLE_PREFIX_SIZE;

use crate::error::CodecError;
use crate::value::{Value, ValueType};

const SIGN_BIT: u64 = 1 << 63;

/// Escapes 0x00 and 0x01 so the result contains no 0x00.
///
/// # Example
///
/// ```rust
/// use strata_table::codec::escape_bytes;
///
/// assert_eq!(escape_bytes(b"a\x00b").as_ref(), b"a\x01\x01b");
/// assert_eq!(escape_bytes(b"\x01").as_ref(), b"\x01\x02");
/// ```
pub fn escape_bytes(input: &[u8]) -> Cow<'_, [u8]> {
    let count = input.iter().filter(|b| **b <= 1).count();
    if count == 0 {
        return Cow::Borrowed(input);
    }

    let mut out = Vec::with_capacity(input.len() + count);
    for &b in input {
        if b <= 1 {
            out.push(0x01);
            out.push(b + 1);
        } else {
            out.push(b);
        }
    }
    Cow::Owned(out)
}

/// Reverses [`escape_bytes`].
pub fn unescape_bytes(input: &[u8]) -> Result<Cow<'_, [u8]>, CodecError> {
    if !input.contains(&0x01) {
        return Ok(Cow::Borrowed(input));
    }

    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.iter();
    while let Some(&b) = iter.next() {
        if b != 0x01 {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(&next) if next == 1 || next == 2 => out.push(next - 1),
            Some(&other) => return Err(CodecError::BadEscape(other)),
            None => return Err(CodecError::TruncatedEscape),
        }
    }
    Ok(Cow::Owned(out))
}

/// Appends the encoding of `vals` to `out`.
pub fn encode_values(out: &mut Vec<u8>, vals: &[Value]) {
    for val in vals {
        match val {
            Value::Int64(v) => out.put_u64(*v as u64 ^ SIGN_BIT),
            Value::Bytes(v) => {
                out.put_slice(&escape_bytes(v));
                out.put_u8(0);
            }
        }
    }
}

/// Encodes a key: `prefix` followed by `vals`.
pub fn encode_key(prefix: u32, vals: &[Value]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TABLE_PREFIX_SIZE + vals.len() * 9);
    out.put_u32(prefix);
    encode_values(&mut out, vals);
    out
}

/// Decodes values of the given types. The input must be consumed exactly.
pub fn decode_values(input: &[u8], types: &[ValueType]) -> Result<Vec<Value>, CodecError> {
    let mut input = input;
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        let val = match ty {
            ValueType::Int64 => {
                if input.remaining() < 8 {
                    return Err(CodecError::ShortInput {
                        needed: 8,
                        available: input.remaining(),
                    });
                }
                Value::Int64((input.get_u64() ^ SIGN_BIT) as i64)
            }
            ValueType::Bytes => {
                let end = input
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or(CodecError::MissingTerminator)?;
                let val = unescape_bytes(&input[..end])?.into_owned();
                input.advance(end + 1);
                Value::Bytes(val)
            }
        };
        out.push(val);
    }

    if input.has_remaining() {
        return Err(CodecError::TrailingBytes(input.remaining()));
    }
    Ok(out)
}

/// Decodes a key produced by [`encode_key`] with the same `prefix`.
pub fn decode_key(input: &[u8], prefix: u32, types: &[ValueType]) -> Result<Vec<Value>, CodecError> {
    if input.len() < TABLE_PREFIX_SIZE {
        return Err(CodecError::ShortInput {
            needed: TABLE_PREFIX_SIZE,
            available: input.len(),
        });
    }
    let found = (&input[..TABLE_PREFIX_SIZE]).get_u32();
    if found != prefix {
        return Err(CodecError::PrefixMismatch {
            expected: prefix,
            found,
        });
    }
    decode_values(&input[TABLE_PREFIX_SIZE..], types)
}

/// The bare 4-byte prefix of a table; every key of the table sorts at or
/// after it.
pub fn prefix_key(prefix: u32) -> Vec<u8> {
    prefix.to_be_bytes().to_vec()
}
