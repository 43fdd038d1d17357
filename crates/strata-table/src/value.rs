//! Column values and types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a column.
///
/// Serialized as its numeric tag so stored schemas stay compact; tag 0 is
/// the unset state and is never a valid column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ValueType {
    /// Arbitrary byte string.
    Bytes,
    /// Signed 64-bit integer.
    Int64,
}

impl ValueType {
    /// Numeric tag of this type.
    pub const fn tag(self) -> u32 {
        match self {
            Self::Bytes => 1,
            Self::Int64 => 2,
        }
    }
}

impl TryFrom<u32> for ValueType {
    type Error = String;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::Bytes),
            2 => Ok(Self::Int64),
            other => Err(format!("unknown value type tag {}", other)),
        }
    }
}

impl From<ValueType> for u32 {
    fn from(ty: ValueType) -> Self {
        ty.tag()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes => f.write_str("BYTES"),
            Self::Int64 => f.write_str("INT64"),
        }
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Byte string.
    Bytes(Vec<u8>),
    /// 64-bit integer.
    Int64(i64),
}

impl Value {
    /// Returns the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bytes(_) => ValueType::Bytes,
            Self::Int64(_) => ValueType::Int64,
        }
    }

    /// Returns the integer, if this is an `Int64`.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Bytes(_) => None,
        }
    }

    /// Returns the bytes, if this is a `Bytes`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            Self::Int64(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Bytes(v.as_bytes().to_vec())
    }
}

impl fmt::Display for Value {
    /// Integers print as numbers; byte strings print as text when they are
    /// valid UTF-8 and as hex otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{}", v),
            Self::Bytes(v) => match std::str::from_utf8(v) {
                Ok(s) => f.write_str(s),
                Err(_) => {
                    f.write_str("0x")?;
                    for b in v {
                        write!(f, "{:02x}", b)?;
                    }
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(ValueType::Bytes.tag(), 1);
        assert_eq!(ValueType::Int64.tag(), 2);
        assert_eq!(ValueType::try_from(2u32), Ok(ValueType::Int64));
        assert!(ValueType::try_from(0u32).is_err());
        assert!(ValueType::try_from(3u32).is_err());
    }

    #[test]
    fn test_type_serde() {
        let json = serde_json::to_string(&vec![ValueType::Int64, ValueType::Bytes]).unwrap();
        assert_eq!(json, "[2,1]");

        let types: Vec<ValueType> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(types, vec![ValueType::Bytes, ValueType::Int64]);
        assert!(serde_json::from_str::<ValueType>("0").is_err());
    }

    #[test]
    fn test_accessors() {
        let v = Value::from(7i64);
        assert_eq!(v.value_type(), ValueType::Int64);
        assert_eq!(v.as_int64(), Some(7));
        assert_eq!(v.as_bytes(), None);

        let v = Value::from("abc");
        assert_eq!(v.value_type(), ValueType::Bytes);
        assert_eq!(v.as_bytes(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int64(-3).to_string(), "-3");
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::Bytes(vec![0xff, 0x00]).to_string(), "0xff00");
    }
}
