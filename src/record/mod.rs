//! Schema-less, ordered, typed field containers.
//!
//! A [`Record`] is an ordered mapping from a numeric [`FieldId`] to a typed
//! [`Value`]: 64-bit signed integer, UTF-8 string, IEEE-754 double, or a
//! nested array of records. Records carry an arbitrary subset of fields —
//! there is no schema — and preserve insertion order across a wire
//! round-trip.
//!
//! Records double as query predicates: [`Record::matches`] treats a record
//! as a conjunction of field-equality constraints (see the method docs for
//! the exact semantics per type).
//!
//! # Wire format
//!
//! ```text
//! record := [u32 field_count] field*
//! field  := [u32 id] [u8 tag] payload
//! tag 1  := Int     — i64, little-endian
//! tag 2  := Str     — [u32 len][utf-8 bytes]
//! tag 3  := Double  — f64 bit pattern, little-endian
//! tag 4  := Array   — [u32 count] record*
//! ```


use thiserror::Error;
use tracing::trace;

use crate::wire::{MAX_NEST_DEPTH, Reader, WireError, put_f64, put_i64, put_str, put_u8, put_u32};

/// Identifier of a record field.
pub type FieldId = u32;

/// Tolerance for double-typed field comparison in [`Record::matches`].
pub const EPSILON: f64 = 1e-6;

const TAG_INT: u8 = 1;
const TAG_STR: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_ARRAY: u8 = 4;

/// Errors raised by typed field access.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The requested field is not present on the record.
    #[error("field {0} is missing")]
    FieldMissing(FieldId),

    /// The field exists but holds a different type.
    #[error("field {field} has type {actual}, expected {expected}")]
    TypeMismatch {
        /// The field that was accessed.
        field: FieldId,
        /// The type the accessor asked for.
        expected: &'static str,
        /// The type actually stored.
        actual: &'static str,
    },
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// IEEE-754 double.
    Double(f64),
    /// Nested array of records.
    Array(Vec<Record>),
}

impl Value {
    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Double(_) => "double",
            Value::Array(_) => "array",
        }
    }
}

/// An ordered, schema-less collection of typed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(FieldId, Value)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields on the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `true` if the record carries the given field.
    pub fn contains(&self, field: FieldId) -> bool {
        self.fields.iter().any(|(id, _)| *id == field)
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId, &Value)> {
        self.fields.iter().map(|(id, v)| (*id, v))
    }

    /// Consume the record, yielding its fields in insertion order.
    pub(crate) fn into_fields(self) -> Vec<(FieldId, Value)> {
        self.fields
    }

    /// Set a field, replacing an existing value in place (the field keeps
    /// its original position) or appending a new one.
    pub fn set(&mut self, field: FieldId, value: Value) {
        match self.fields.iter_mut().find(|(id, _)| *id == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Builder-style [`set`](Self::set) of an integer field.
    pub fn with_int(mut self, field: FieldId, v: i64) -> Self {
        self.set(field, Value::Int(v));
        self
    }

    /// Builder-style [`set`](Self::set) of a string field.
    pub fn with_str(mut self, field: FieldId, v: impl Into<String>) -> Self {
        self.set(field, Value::Str(v.into()));
        self
    }

    /// Builder-style [`set`](Self::set) of a double field.
    pub fn with_double(mut self, field: FieldId, v: f64) -> Self {
        self.set(field, Value::Double(v));
        self
    }

    /// Look up a field by id.
    pub fn get(&self, field: FieldId) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(id, _)| *id == field)
            .map(|(_, v)| v)
    }

    /// Typed accessor for an integer field.
    pub fn get_int(&self, field: FieldId) -> Result<i64, RecordError> {
        match self.get(field) {
            None => Err(RecordError::FieldMissing(field)),
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(RecordError::TypeMismatch {
                field,
                expected: "int",
                actual: other.type_name(),
            }),
        }
    }

    /// Typed accessor for a string field.
    pub fn get_str(&self, field: FieldId) -> Result<&str, RecordError> {
        match self.get(field) {
            None => Err(RecordError::FieldMissing(field)),
            Some(Value::Str(v)) => Ok(v),
            Some(other) => Err(RecordError::TypeMismatch {
                field,
                expected: "str",
                actual: other.type_name(),
            }),
        }
    }

    /// Typed accessor for a double field.
    pub fn get_double(&self, field: FieldId) -> Result<f64, RecordError> {
        match self.get(field) {
            None => Err(RecordError::FieldMissing(field)),
            Some(Value::Double(v)) => Ok(*v),
            Some(other) => Err(RecordError::TypeMismatch {
                field,
                expected: "double",
                actual: other.type_name(),
            }),
        }
    }

    /// Typed accessor for an array field.
    pub fn get_array(&self, field: FieldId) -> Result<&[Record], RecordError> {
        match self.get(field) {
            None => Err(RecordError::FieldMissing(field)),
            Some(Value::Array(v)) => Ok(v),
            Some(other) => Err(RecordError::TypeMismatch {
                field,
                expected: "array",
                actual: other.type_name(),
            }),
        }
    }

    /// Append a record to an array field, creating the field if absent.
    ///
    /// Fails with [`RecordError::TypeMismatch`] if the field exists with a
    /// non-array type.
    pub fn append_array(&mut self, field: FieldId, entry: Record) -> Result<(), RecordError> {
        match self.fields.iter_mut().find(|(id, _)| *id == field) {
            Some((_, Value::Array(entries))) => {
                entries.push(entry);
                Ok(())
            }
            Some((_, other)) => Err(RecordError::TypeMismatch {
                field,
                expected: "array",
                actual: other.type_name(),
            }),
            None => {
                self.fields.push((field, Value::Array(vec![entry])));
                Ok(())
            }
        }
    }

    // --------------------------------------------------------------------------------------------
    // Predicate matching
    // --------------------------------------------------------------------------------------------

    /// Test this record against a partial-match query.
    ///
    /// Every field present on `query` must be present on `self` with the
    /// same type and an equal value: integers and strings compare exactly,
    /// doubles compare within [`EPSILON`]. Array-typed query fields never
    /// match. Fields absent from the query are unconstrained, so an empty
    /// query matches every record.
    pub fn matches(&self, query: &Record) -> bool {
        for (field, wanted) in query.iter() {
            let Some(actual) = self.get(field) else {
                trace!("no match: field {} absent", field);
                return false;
            };
            let equal = match (wanted, actual) {
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Double(a), Value::Double(b)) => (a - b).abs() < EPSILON,
                // Type mismatch or non-scalar query field.
                _ => false,
            };
            if !equal {
                return false;
            }
        }
        true
    }

    // --------------------------------------------------------------------------------------------
    // Wire format
    // --------------------------------------------------------------------------------------------

    /// Append the encoded record to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        let count = u32::try_from(self.fields.len())
            .map_err(|_| WireError::LengthOverflow(format!("{} fields", self.fields.len())))?;
        put_u32(buf, count);
        for (id, value) in &self.fields {
            put_u32(buf, *id);
            match value {
                Value::Int(v) => {
                    put_u8(buf, TAG_INT);
                    put_i64(buf, *v);
                }
                Value::Str(v) => {
                    put_u8(buf, TAG_STR);
                    put_str(buf, v)?;
                }
                Value::Double(v) => {
                    put_u8(buf, TAG_DOUBLE);
                    put_f64(buf, *v);
                }
                Value::Array(entries) => {
                    put_u8(buf, TAG_ARRAY);
                    let n = u32::try_from(entries.len()).map_err(|_| {
                        WireError::LengthOverflow(format!("{} array entries", entries.len()))
                    })?;
                    put_u32(buf, n);
                    for entry in entries {
                        entry.encode(buf)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Encode into a freshly-allocated buffer.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Decode one record from the reader, leaving the cursor after it.
    ///
    /// Nesting is capped at [`MAX_NEST_DEPTH`](crate::wire::MAX_NEST_DEPTH);
    /// deeper buffers fail with [`WireError::DepthExceeded`] rather than
    /// exhausting the stack.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Self::decode_at_depth(r, 0)
    }

    fn decode_at_depth(r: &mut Reader<'_>, depth: u32) -> Result<Self, WireError> {
        if depth > MAX_NEST_DEPTH {
            return Err(WireError::DepthExceeded(MAX_NEST_DEPTH));
        }
        let count = r.read_count()?;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let id = r.read_u32()?;
            let tag = r.read_u8()?;
            let value = match tag {
                TAG_INT => Value::Int(r.read_i64()?),
                TAG_STR => Value::Str(r.read_str()?),
                TAG_DOUBLE => Value::Double(r.read_f64()?),
                TAG_ARRAY => {
                    let n = r.read_count()?;
                    let mut entries = Vec::with_capacity(n);
                    for _ in 0..n {
                        entries.push(Record::decode_at_depth(r, depth + 1)?);
                    }
                    Value::Array(entries)
                }
                other => {
                    return Err(WireError::InvalidTag {
                        tag: other,
                        type_name: "Value",
                    });
                }
            };
            fields.push((id, value));
        }
        Ok(Self { fields })
    }

    /// Decode a record that occupies the whole of `buf`.
    pub fn decode_slice(buf: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(buf);
        let record = Record::decode(&mut r)?;
        r.expect_end()?;
        Ok(record)
    }
}
