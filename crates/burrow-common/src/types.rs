//! Type identifiers and runtime values for BurrowDB columns.

use crate::error::{BurrowError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identifier for all supported column types in BurrowDB.
///
/// Type IDs are stored in the schema blob inside each table's meta node to
/// identify the type of each column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeId {
    Null = 0,
    Boolean = 1,
    Integer = 2,
    Float = 3,
    Text = 4,
}

impl TypeId {
    /// Returns the fixed payload size of this type inside a record slot.
    ///
    /// Text columns do not store their bytes inline: the record slot holds
    /// an overflow pointer (block: 4, slot: 2, length: 4) into the owning
    /// leaf's data chain.
    pub fn slot_size(&self) -> usize {
        match self {
            TypeId::Null => 0,
            TypeId::Boolean => 1,
            TypeId::Integer => 8,
            TypeId::Float => 8,
            TypeId::Text => 10,
        }
    }

    /// Returns true if values of this type can order a table's key.
    pub fn is_comparable(&self) -> bool {
        !matches!(self, TypeId::Null)
    }

    /// Returns true if this type is a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeId::Integer | TypeId::Float)
    }

    /// Decodes a type tag, returning None for unknown values.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(TypeId::Null),
            1 => Some(TypeId::Boolean),
            2 => Some(TypeId::Integer),
            3 => Some(TypeId::Float),
            4 => Some(TypeId::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeId::Null => "NULL",
            TypeId::Boolean => "BOOLEAN",
            TypeId::Integer => "INTEGER",
            TypeId::Float => "FLOAT",
            TypeId::Text => "TEXT",
        };
        write!(f, "{}", name)
    }
}

/// A runtime column value.
///
/// Strings carry their bytes inline in memory; on disk a record slot holds
/// an overflow pointer instead and the bytes live in the leaf's data chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Returns the type of this value.
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Null => TypeId::Null,
            Value::Boolean(_) => TypeId::Boolean,
            Value::Integer(_) => TypeId::Integer,
            Value::Float(_) => TypeId::Float,
            Value::Text(_) => TypeId::Text,
        }
    }

    /// Returns true if this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compares two values of the same type.
    ///
    /// Comparing values of different types is a contract violation and
    /// returns `TypeMismatch`; two nulls compare equal.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            _ => Err(BurrowError::TypeMismatch {
                expected: self.type_id().to_string(),
                actual: other.type_id().to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_sizes() {
        assert_eq!(TypeId::Null.slot_size(), 0);
        assert_eq!(TypeId::Boolean.slot_size(), 1);
        assert_eq!(TypeId::Integer.slot_size(), 8);
        assert_eq!(TypeId::Float.slot_size(), 8);
        assert_eq!(TypeId::Text.slot_size(), 10);
    }

    #[test]
    fn test_is_comparable() {
        assert!(TypeId::Boolean.is_comparable());
        assert!(TypeId::Integer.is_comparable());
        assert!(TypeId::Float.is_comparable());
        assert!(TypeId::Text.is_comparable());
        assert!(!TypeId::Null.is_comparable());
    }

    #[test]
    fn test_is_numeric() {
        assert!(TypeId::Integer.is_numeric());
        assert!(TypeId::Float.is_numeric());
        assert!(!TypeId::Boolean.is_numeric());
        assert!(!TypeId::Text.is_numeric());
        assert!(!TypeId::Null.is_numeric());
    }

    #[test]
    fn test_type_id_from_u8() {
        for type_id in [
            TypeId::Null,
            TypeId::Boolean,
            TypeId::Integer,
            TypeId::Float,
            TypeId::Text,
        ] {
            assert_eq!(TypeId::from_u8(type_id as u8), Some(type_id));
        }
        assert_eq!(TypeId::from_u8(99), None);
    }

    #[test]
    fn test_type_id_display() {
        assert_eq!(TypeId::Null.to_string(), "NULL");
        assert_eq!(TypeId::Boolean.to_string(), "BOOLEAN");
        assert_eq!(TypeId::Integer.to_string(), "INTEGER");
        assert_eq!(TypeId::Float.to_string(), "FLOAT");
        assert_eq!(TypeId::Text.to_string(), "TEXT");
    }

    #[test]
    fn test_value_type_id() {
        assert_eq!(Value::Null.type_id(), TypeId::Null);
        assert_eq!(Value::Boolean(true).type_id(), TypeId::Boolean);
        assert_eq!(Value::Integer(7).type_id(), TypeId::Integer);
        assert_eq!(Value::Float(1.5).type_id(), TypeId::Float);
        assert_eq!(Value::Text("x".to_string()).type_id(), TypeId::Text);
    }

    #[test]
    fn test_value_compare_same_type() {
        assert_eq!(
            Value::Integer(1).compare(&Value::Integer(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Integer(5).compare(&Value::Integer(5)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            Value::Float(2.5).compare(&Value::Float(1.0)).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            Value::Text("abc".to_string())
                .compare(&Value::Text("abd".to_string()))
                .unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Boolean(false)
                .compare(&Value::Boolean(true))
                .unwrap(),
            Ordering::Less
        );
        assert_eq!(Value::Null.compare(&Value::Null).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_value_compare_mismatch_is_error() {
        let result = Value::Integer(1).compare(&Value::Text("1".to_string()));
        assert!(matches!(result, Err(BurrowError::TypeMismatch { .. })));

        let result = Value::Null.compare(&Value::Integer(1));
        assert!(matches!(result, Err(BurrowError::TypeMismatch { .. })));
    }

    #[test]
    fn test_value_compare_float_total_order() {
        // total_cmp gives NaN a defined position instead of poisoning sorts
        let nan = Value::Float(f64::NAN);
        let one = Value::Float(1.0);
        assert_eq!(nan.compare(&nan).unwrap(), Ordering::Equal);
        assert_eq!(one.compare(&nan).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::Integer(-3).to_string(), "-3");
        assert_eq!(Value::Text("hi".to_string()).to_string(), "hi");
    }

    #[test]
    fn test_type_id_serde_roundtrip() {
        let original = TypeId::Text;
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: TypeId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
