//! Key and value codec strategies for the dictionary facade.
//!
//! A [`Codec`] is a closed set of strategies converting between a typed
//! [`Datum`] and its byte representation. The codec is chosen once, at
//! store construction — [`Codec::from_tag`] validates the legacy
//! single-character type codes (`b`, `i`, `s`, `f`, `B`) up front and
//! rejects unknown tags immediately, never per call.


use thiserror::Error;

use crate::record::Record;
use crate::wire::{Reader, WireError};

/// Errors raised by codec construction or use.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The type tag given at construction is not a known codec.
    #[error("unknown codec tag '{0}'")]
    UnknownTag(char),

    /// The datum's type does not match the codec's.
    #[error("codec {codec} cannot encode {datum} datum")]
    TypeMismatch {
        /// The codec that was asked to encode.
        codec: &'static str,
        /// The datum variant it received.
        datum: &'static str,
    },

    /// The stored bytes have the wrong shape for this codec.
    #[error("stored value malformed for codec {codec}: {reason}")]
    Malformed {
        /// The codec that was decoding.
        codec: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Record payload failed to decode.
    #[error("{0}")]
    Wire(#[from] WireError),
}

/// A typed key or value handled by the dictionary facade.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// IEEE-754 double.
    Float(f64),
    /// A structured record.
    Record(Record),
}

impl Datum {
    /// Human-readable variant name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Bytes(_) => "bytes",
            Datum::Int(_) => "int",
            Datum::Str(_) => "str",
            Datum::Float(_) => "float",
            Datum::Record(_) => "record",
        }
    }
}

/// A key or value encoding strategy, fixed at store construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Raw bytes, stored verbatim.
    Bytes,
    /// `i64`, 8 bytes little-endian.
    Int,
    /// UTF-8 string, stored as its raw bytes.
    Str,
    /// `f64` bit pattern, 8 bytes little-endian.
    Float,
    /// Structured record in the record wire format.
    Record,
}

impl Codec {
    /// Resolve a legacy single-character type code.
    ///
    /// `b` = bytes, `i` = int, `s` = str, `f` = float, `B` = record.
    /// Anything else — including the original pickle code `O`, which has
    /// no representation here — fails with [`CodecError::UnknownTag`].
    pub fn from_tag(tag: char) -> Result<Self, CodecError> {
        match tag {
            'b' => Ok(Codec::Bytes),
            'i' => Ok(Codec::Int),
            's' => Ok(Codec::Str),
            'f' => Ok(Codec::Float),
            'B' => Ok(Codec::Record),
            other => Err(CodecError::UnknownTag(other)),
        }
    }

    /// Strategy name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Bytes => "bytes",
            Codec::Int => "int",
            Codec::Str => "str",
            Codec::Float => "float",
            Codec::Record => "record",
        }
    }

    /// Encode a datum of this codec's type.
    pub fn encode(&self, datum: &Datum) -> Result<Vec<u8>, CodecError> {
        match (self, datum) {
            (Codec::Bytes, Datum::Bytes(v)) => Ok(v.clone()),
            (Codec::Int, Datum::Int(v)) => Ok(v.to_le_bytes().to_vec()),
            (Codec::Str, Datum::Str(v)) => Ok(v.as_bytes().to_vec()),
            (Codec::Float, Datum::Float(v)) => Ok(v.to_le_bytes().to_vec()),
            (Codec::Record, Datum::Record(v)) => Ok(v.encode_to_vec()?),
            (codec, datum) => Err(CodecError::TypeMismatch {
                codec: codec.name(),
                datum: datum.type_name(),
            }),
        }
    }

    /// Decode stored bytes back into a datum of this codec's type.
    pub fn decode(&self, bytes: &[u8]) -> Result<Datum, CodecError> {
        match self {
            Codec::Bytes => Ok(Datum::Bytes(bytes.to_vec())),
            Codec::Int => {
                let mut r = Reader::new(bytes);
                let v = r.read_i64().map_err(|_| CodecError::Malformed {
                    codec: "int",
                    reason: format!("expected 8 bytes, got {}", bytes.len()),
                })?;
                r.expect_end().map_err(|_| CodecError::Malformed {
                    codec: "int",
                    reason: format!("expected 8 bytes, got {}", bytes.len()),
                })?;
                Ok(Datum::Int(v))
            }
            Codec::Str => {
                let s = std::str::from_utf8(bytes).map_err(|e| CodecError::Malformed {
                    codec: "str",
                    reason: e.to_string(),
                })?;
                Ok(Datum::Str(s.to_owned()))
            }
            Codec::Float => {
                let mut r = Reader::new(bytes);
                let v = r.read_f64().map_err(|_| CodecError::Malformed {
                    codec: "float",
                    reason: format!("expected 8 bytes, got {}", bytes.len()),
                })?;
                r.expect_end().map_err(|_| CodecError::Malformed {
                    codec: "float",
                    reason: format!("expected 8 bytes, got {}", bytes.len()),
                })?;
                Ok(Datum::Float(v))
            }
            Codec::Record => Ok(Datum::Record(Record::decode_slice(bytes)?)),
        }
    }
}
