//! Column types, typed values and rows.
//!
//! A row value is a sum type over the four column types, so a row can be
//! checked against its schema when it is built instead of carrying untyped
//! cells around.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{TabError, TabResult};

/// Column data types. The discriminant is the on-disk type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    /// 32-bit signed integer
    Int32 = 0,
    /// 32-bit unsigned integer
    UInt32 = 1,
    /// 32-bit IEEE float
    Float32 = 2,
    /// Variable-length UTF-8 string
    String = 3,
}

impl DataType {
    /// Type tag written by the codec.
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Inverse of [`DataType::tag`].
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(DataType::Int32),
            1 => Some(DataType::UInt32),
            2 => Some(DataType::Float32),
            3 => Some(DataType::String),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int32 => "INT",
            DataType::UInt32 => "UINT",
            DataType::Float32 => "FLOAT",
            DataType::String => "STRING",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = TabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INT" | "INT32" => Ok(DataType::Int32),
            "UINT" | "UINT32" => Ok(DataType::UInt32),
            "FLOAT" | "FLOAT32" => Ok(DataType::Float32),
            "STRING" | "STR" | "TEXT" => Ok(DataType::String),
            other => Err(TabError::InvalidSchema {
                reason: format!("unknown column type '{}'", other),
            }),
        }
    }
}

/// One named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type }
    }
}

/// How numeric literals in filters and updates are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiteralPolicy {
    /// A literal that does not parse is an `InvalidLiteral` error.
    #[default]
    Strict,
    /// A literal that does not parse becomes the type's zero value.
    Lenient,
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Str(String),
}

impl Value {
    /// The zero value for a type: `0`, `0.0` or the empty string.
    pub fn zero(data_type: DataType) -> Self {
        match data_type {
            DataType::Int32 => Value::Int32(0),
            DataType::UInt32 => Value::UInt32(0),
            DataType::Float32 => Value::Float32(0.0),
            DataType::String => Value::Str(String::new()),
        }
    }

    /// Runtime type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int32(_) => DataType::Int32,
            Value::UInt32(_) => DataType::UInt32,
            Value::Float32(_) => DataType::Float32,
            Value::Str(_) => DataType::String,
        }
    }

    /// Parse a text literal as a value of `data_type`.
    ///
    /// Surrounding whitespace is ignored for numeric types. String literals
    /// are taken verbatim and never fail.
    pub fn parse(data_type: DataType, literal: &str, policy: LiteralPolicy) -> TabResult<Self> {
        let text = literal.trim();
        let parsed = match data_type {
            DataType::Int32 => text.parse::<i32>().ok().map(Value::Int32),
            DataType::UInt32 => text.parse::<u32>().ok().map(Value::UInt32),
            DataType::Float32 => text.parse::<f32>().ok().map(Value::Float32),
            DataType::String => return Ok(Value::Str(literal.to_string())),
        };

        match (parsed, policy) {
            (Some(value), _) => Ok(value),
            (None, LiteralPolicy::Lenient) => Ok(Value::zero(data_type)),
            (None, LiteralPolicy::Strict) => Err(TabError::InvalidLiteral {
                literal: literal.to_string(),
                expected: data_type,
            }),
        }
    }

    /// Order two values of the same type.
    ///
    /// Strings compare byte-wise. Returns `None` for mismatched types and
    /// for float comparisons involving NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::UInt32(a), Value::UInt32(b)) => Some(a.cmp(b)),
            (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int32(v) }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self { Value::UInt32(v) }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self { Value::Float32(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v) }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{:.2}", v),
            Value::Str(v) => f.write_str(v),
        }
    }
}

/// An ordered sequence of values, one per attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for ty in [DataType::Int32, DataType::UInt32, DataType::Float32, DataType::String] {
            assert_eq!(DataType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(DataType::from_tag(4), None);
    }

    #[test]
    fn test_type_names_parse() {
        assert_eq!("INT".parse::<DataType>().unwrap(), DataType::Int32);
        assert_eq!("uint".parse::<DataType>().unwrap(), DataType::UInt32);
        assert_eq!("Float".parse::<DataType>().unwrap(), DataType::Float32);
        assert_eq!("STRING".parse::<DataType>().unwrap(), DataType::String);
        assert!(matches!("BLOB".parse::<DataType>(), Err(TabError::InvalidSchema { .. })));
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero(DataType::Int32), Value::Int32(0));
        assert_eq!(Value::zero(DataType::UInt32), Value::UInt32(0));
        assert_eq!(Value::zero(DataType::Float32), Value::Float32(0.0));
        assert_eq!(Value::zero(DataType::String), Value::Str(String::new()));
    }

    #[test]
    fn test_strict_parse_rejects_garbage() {
        let err = Value::parse(DataType::Int32, "12abc", LiteralPolicy::Strict).unwrap_err();
        assert!(matches!(err, TabError::InvalidLiteral { expected: DataType::Int32, .. }));
        assert!(Value::parse(DataType::UInt32, "-1", LiteralPolicy::Strict).is_err());
    }

    #[test]
    fn test_lenient_parse_coerces_to_zero() {
        assert_eq!(Value::parse(DataType::Int32, "oops", LiteralPolicy::Lenient).unwrap(), Value::Int32(0));
        assert_eq!(Value::parse(DataType::Float32, "", LiteralPolicy::Lenient).unwrap(), Value::Float32(0.0));
        assert_eq!(Value::parse(DataType::UInt32, " 7 ", LiteralPolicy::Lenient).unwrap(), Value::UInt32(7));
    }

    #[test]
    fn test_string_literal_is_verbatim() {
        let v = Value::parse(DataType::String, " spaced ", LiteralPolicy::Strict).unwrap();
        assert_eq!(v, Value::Str(" spaced ".to_string()));
    }

    #[test]
    fn test_compare_strings_bytewise() {
        let a = Value::from("Zebra");
        let b = Value::from("apple");
        // 'Z' (0x5A) sorts before 'a' (0x61)
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&Value::from("Zebra")), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_mismatched_types() {
        assert_eq!(Value::Int32(1).compare(&Value::UInt32(1)), None);
        assert_eq!(Value::Float32(f32::NAN).compare(&Value::Float32(1.0)), None);
    }
}
