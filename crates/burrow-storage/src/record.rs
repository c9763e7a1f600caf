//! Record and value serialization.
//!
//! Records are fixed-length per schema: every field occupies one presence
//! byte plus a fixed payload slot. Text fields do not store their bytes in
//! the record; the slot holds an [`OverflowPtr`] into the owning leaf's
//! data chain and the string bytes live out of line.
//!
//! A second, inline encoding (`encode_value`/`decode_value`) serializes a
//! value tag-prefixed with its bytes in place. It is used where a
//! self-contained byte form is needed: internal-node separator keys and
//! grouping keys.

use burrow_common::{BurrowError, Result, TypeId, Value};
use bytes::{BufMut, Bytes, BytesMut};

/// Location of a string's first fragment in the overflow chain.
///
/// Layout (10 bytes): block u32, slot u16, len u32. A zero block with zero
/// length denotes the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowPtr {
    /// Page number of the data node holding the first fragment.
    pub block: u32,
    /// Fragment slot within that data node.
    pub slot: u16,
    /// Total string length in bytes.
    pub len: u32,
}

#[inline]
fn read_i64(b: &[u8]) -> i64 {
    i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

#[inline]
fn read_f64(b: &[u8]) -> f64 {
    f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

impl OverflowPtr {
    /// Encoded size in bytes.
    pub const SIZE: usize = 10;

    /// Pointer for the empty string (no fragments).
    pub const EMPTY: OverflowPtr = OverflowPtr {
        block: 0,
        slot: 0,
        len: 0,
    };

    /// Serializes the pointer into a 10-byte buffer.
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.block.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot.to_le_bytes());
        buf[6..10].copy_from_slice(&self.len.to_le_bytes());
    }

    /// Deserializes a pointer from a 10-byte buffer.
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            block: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            slot: u16::from_le_bytes([buf[4], buf[5]]),
            len: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
        }
    }
}

/// One column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub type_id: TypeId,
}

impl Field {
    pub fn new(name: impl Into<String>, type_id: TypeId) -> Self {
        Self {
            name: name.into(),
            type_id,
        }
    }
}

/// Ordered column definitions plus the key column's position.
///
/// Persisted as a blob inside the table's meta node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
    key_index: usize,
}

impl Schema {
    /// Creates a schema, validating the key column.
    pub fn new(fields: Vec<Field>, key_index: usize) -> Result<Self> {
        if key_index >= fields.len() {
            return Err(BurrowError::InvalidKey(format!(
                "key index {} out of range for {} columns",
                key_index,
                fields.len()
            )));
        }
        if !fields[key_index].type_id.is_comparable() {
            return Err(BurrowError::InvalidKey(format!(
                "key column {} has non-comparable type {}",
                fields[key_index].name, fields[key_index].type_id
            )));
        }
        for field in &fields {
            // Names persist with a one-byte length prefix.
            if field.name.is_empty() || field.name.len() > u8::MAX as usize {
                return Err(BurrowError::SchemaError(format!(
                    "invalid column name {:?}",
                    field.name
                )));
            }
        }
        Ok(Self { fields, key_index })
    }

    /// Returns the columns in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the key column's position.
    pub fn key_index(&self) -> usize {
        self.key_index
    }

    /// Returns the position of a column by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the fixed on-disk size of one record under this schema.
    pub fn record_size(&self) -> usize {
        self.fields
            .iter()
            .map(|f| 1 + f.type_id.slot_size())
            .sum()
    }

    /// Returns the byte offset of a field's slot within a record.
    pub fn field_offset(&self, index: usize) -> usize {
        self.fields[..index]
            .iter()
            .map(|f| 1 + f.type_id.slot_size())
            .sum()
    }

    /// Serializes the schema for the meta node blob.
    ///
    /// Layout: key_index u16, field count u16, then per field a type tag
    /// byte, a name-length byte, and the name bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.key_index as u16).to_le_bytes());
        buf.extend_from_slice(&(self.fields.len() as u16).to_le_bytes());
        for field in &self.fields {
            buf.push(field.type_id as u8);
            buf.push(field.name.len() as u8);
            buf.extend_from_slice(field.name.as_bytes());
        }
        buf
    }

    /// Deserializes a schema from the meta node blob.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| BurrowError::CorruptNode {
            page_no: 0,
            reason: format!("schema blob: {}", reason),
        };

        if buf.len() < 4 {
            return Err(corrupt("truncated header"));
        }
        let key_index = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let count = u16::from_le_bytes([buf[2], buf[3]]) as usize;

        let mut fields = Vec::with_capacity(count);
        let mut pos = 4;
        for _ in 0..count {
            if pos + 2 > buf.len() {
                return Err(corrupt("truncated field header"));
            }
            let type_id =
                TypeId::from_u8(buf[pos]).ok_or_else(|| corrupt("unknown field type"))?;
            let name_len = buf[pos + 1] as usize;
            pos += 2;
            if pos + name_len > buf.len() {
                return Err(corrupt("truncated field name"));
            }
            let name = std::str::from_utf8(&buf[pos..pos + name_len])
                .map_err(|_| corrupt("field name not utf-8"))?
                .to_string();
            pos += name_len;
            fields.push(Field { name, type_id });
        }

        Schema::new(fields, key_index)
    }
}

/// One row of typed values, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the key value under the given schema.
    pub fn key<'a>(&'a self, schema: &Schema) -> &'a Value {
        &self.values[schema.key_index()]
    }
}

/// A field as stored in a record slot: inline value, or overflow pointer
/// for text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoredField {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(OverflowPtr),
}

/// Serializes a row of stored fields into its fixed-length byte form.
///
/// The field list must match the schema in length and types; a mismatch is
/// a `TypeMismatch` error.
pub fn encode_row(schema: &Schema, fields: &[StoredField]) -> Result<Vec<u8>> {
    if fields.len() != schema.fields().len() {
        return Err(BurrowError::TypeMismatch {
            expected: format!("{} columns", schema.fields().len()),
            actual: format!("{} columns", fields.len()),
        });
    }

    let mut buf = vec![0u8; schema.record_size()];
    for (i, (field, def)) in fields.iter().zip(schema.fields()).enumerate() {
        let off = schema.field_offset(i);
        let slot = &mut buf[off..off + 1 + def.type_id.slot_size()];
        match (field, def.type_id) {
            (StoredField::Null, _) => {
                slot[0] = 0;
            }
            (StoredField::Boolean(b), TypeId::Boolean) => {
                slot[0] = 1;
                slot[1] = *b as u8;
            }
            (StoredField::Integer(v), TypeId::Integer) => {
                slot[0] = 1;
                slot[1..9].copy_from_slice(&v.to_le_bytes());
            }
            (StoredField::Float(v), TypeId::Float) => {
                slot[0] = 1;
                slot[1..9].copy_from_slice(&v.to_le_bytes());
            }
            (StoredField::Text(ptr), TypeId::Text) => {
                slot[0] = 1;
                ptr.encode_into(&mut slot[1..11]);
            }
            _ => {
                return Err(BurrowError::TypeMismatch {
                    expected: def.type_id.to_string(),
                    actual: format!("{:?}", field),
                });
            }
        }
    }
    Ok(buf)
}

/// Deserializes a fixed-length record into stored fields.
pub fn decode_row(schema: &Schema, buf: &[u8]) -> Result<Vec<StoredField>> {
    if buf.len() < schema.record_size() {
        return Err(BurrowError::CorruptNode {
            page_no: 0,
            reason: format!(
                "record of {} bytes, schema needs {}",
                buf.len(),
                schema.record_size()
            ),
        });
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    for (i, def) in schema.fields().iter().enumerate() {
        let off = schema.field_offset(i);
        let slot = &buf[off..off + 1 + def.type_id.slot_size()];
        if slot[0] == 0 {
            fields.push(StoredField::Null);
            continue;
        }
        let field = match def.type_id {
            TypeId::Null => StoredField::Null,
            TypeId::Boolean => StoredField::Boolean(slot[1] != 0),
            TypeId::Integer => StoredField::Integer(read_i64(&slot[1..9])),
            TypeId::Float => StoredField::Float(read_f64(&slot[1..9])),
            TypeId::Text => StoredField::Text(OverflowPtr::decode(&slot[1..11])),
        };
        fields.push(field);
    }
    Ok(fields)
}

/// Decodes only the key field's slot from a record's bytes.
pub fn decode_key_slot(schema: &Schema, buf: &[u8]) -> Result<StoredField> {
    let fields = decode_row(schema, buf)?;
    Ok(fields[schema.key_index()])
}

/// Serializes a value inline, tag-prefixed.
///
/// Text carries its bytes in place (u16 length prefix); used for separator
/// keys and grouping keys, never for record slots.
pub fn encode_value(value: &Value) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    buf.put_u8(value.type_id() as u8);
    match value {
        Value::Null => {}
        Value::Boolean(b) => buf.put_u8(*b as u8),
        Value::Integer(v) => buf.put_slice(&v.to_le_bytes()),
        Value::Float(v) => buf.put_slice(&v.to_le_bytes()),
        Value::Text(s) => {
            if s.len() > u16::MAX as usize {
                return Err(BurrowError::InvalidKey(format!(
                    "inline value of {} bytes exceeds u16 length",
                    s.len()
                )));
            }
            buf.put_u16_le(s.len() as u16);
            buf.put_slice(s.as_bytes());
        }
    }
    Ok(buf.freeze())
}

/// Deserializes an inline value, returning it with the bytes consumed.
pub fn decode_value(buf: &[u8]) -> Result<(Value, usize)> {
    let corrupt = |reason: &str| BurrowError::CorruptNode {
        page_no: 0,
        reason: format!("inline value: {}", reason),
    };

    let tag = *buf.first().ok_or_else(|| corrupt("empty buffer"))?;
    let type_id = TypeId::from_u8(tag).ok_or_else(|| corrupt("unknown tag"))?;
    match type_id {
        TypeId::Null => Ok((Value::Null, 1)),
        TypeId::Boolean => {
            let b = *buf.get(1).ok_or_else(|| corrupt("truncated boolean"))?;
            Ok((Value::Boolean(b != 0), 2))
        }
        TypeId::Integer => {
            let bytes = buf.get(1..9).ok_or_else(|| corrupt("truncated integer"))?;
            Ok((Value::Integer(read_i64(bytes)), 9))
        }
        TypeId::Float => {
            let bytes = buf.get(1..9).ok_or_else(|| corrupt("truncated float"))?;
            Ok((Value::Float(read_f64(bytes)), 9))
        }
        TypeId::Text => {
            let len_bytes = buf.get(1..3).ok_or_else(|| corrupt("truncated length"))?;
            let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
            let bytes = buf
                .get(3..3 + len)
                .ok_or_else(|| corrupt("truncated text"))?;
            let s = std::str::from_utf8(bytes)
                .map_err(|_| corrupt("text not utf-8"))?
                .to_string();
            Ok((Value::Text(s), 3 + len))
        }
    }
}
