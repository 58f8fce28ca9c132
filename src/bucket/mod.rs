//! Bucket keys and the bucket container.
//!
//! Records are grouped into **buckets**: ordered runs of records whose
//! designated timestamp field falls inside the same fixed-width time
//! window. The window start — `(ts / width) * width` — is the bucket key,
//! and one bucket is stored as a single engine entry under the key's
//! 8-byte little-endian form.
//!
//! On the wire a bucket is a record whose field 0 holds the entry array,
//! followed by a CRC32 trailer over the encoded payload. The checksum is
//! verified on every decode; entry order round-trips exactly.


use crate::record::{FieldId, Record, RecordError, Value};
use crate::wire::{Reader, WireError, put_u32};

/// Width of a bucket window, in the unit of the index field (milliseconds).
pub const BUCKET_WIDTH: i64 = 10;

/// Field of the container record that holds the entry array.
const ENTRIES_FIELD: FieldId = 0;

/// Derive the bucket key for a record.
///
/// Reads the integer-typed `index_field` and floors it to a multiple of
/// `width`. Fails with [`RecordError::FieldMissing`] or
/// [`RecordError::TypeMismatch`] when the field is absent or not an
/// integer. Timestamps are assumed non-negative; integer division
/// truncates toward zero, so negative values are not meaningfully
/// bucketed.
///
/// The derivation is idempotent: applying it to an already-bucketed value
/// returns the same key.
pub fn bucket_key(record: &Record, index_field: FieldId, width: i64) -> Result<i64, RecordError> {
    let ts = record.get_int(index_field)?;
    Ok((ts / width) * width)
}

/// The engine-key form of a bucket key: 8 bytes, little-endian.
pub fn key_bytes(key: i64) -> [u8; 8] {
    key.to_le_bytes()
}

/// Recover a bucket key from its engine-key form.
pub fn key_from_bytes(bytes: &[u8]) -> Result<i64, WireError> {
    let mut r = Reader::new(bytes);
    let key = r.read_i64()?;
    r.expect_end()?;
    Ok(key)
}

/// An ordered sequence of records sharing one bucket key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    records: Vec<Record>,
}

impl Bucket {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bucket from records already in insertion order.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Number of records in the bucket.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if the bucket holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records, in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Append one record.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Append every record of `other`, preserving both orders.
    pub fn extend(&mut self, other: Bucket) {
        self.records.extend(other.records);
    }

    /// Keep only records for which `keep` returns `true`.
    pub fn retain(&mut self, keep: impl FnMut(&Record) -> bool) {
        self.records.retain(keep);
    }

    /// Consume the bucket, yielding its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    // --------------------------------------------------------------------------------------------
    // Serialization
    // --------------------------------------------------------------------------------------------

    /// Encode the bucket: container record + CRC32 trailer.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut container = Record::new();
        container.set(ENTRIES_FIELD, Value::Array(self.records.clone()));
        let mut buf = container.encode_to_vec()?;
        let crc = crc32fast::hash(&buf);
        put_u32(&mut buf, crc);
        Ok(buf)
    }

    /// Decode a stored bucket, verifying its checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < 4 {
            return Err(WireError::UnexpectedEof {
                needed: 4,
                available: bytes.len(),
            });
        }
        let (payload, trailer) = bytes.split_at(bytes.len() - 4);
        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(trailer);
        let stored = u32::from_le_bytes(crc_bytes);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(WireError::ChecksumMismatch { stored, computed });
        }

        let container = Record::decode_slice(payload)?;
        let records = container
            .into_fields()
            .into_iter()
            .find_map(|(id, value)| match (id, value) {
                (ENTRIES_FIELD, Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or(WireError::Malformed("bucket entry array missing"))?;
        Ok(Self { records })
    }
}
